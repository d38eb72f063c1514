use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use newsdesk::io::{DEFAULT_LOG_CSV, INITIAL_STAGE};
use newsdesk::llm::from_relaxed_str;
use newsdesk::models::{AlphaRecord, GammaRecord};
use newsdesk::prompts::PromptContext;
use newsdesk::stages::{alpha_context, beta_context, delta_context, gamma_context};
use newsdesk::{
    ChatBackend, ConsoleDecisions, FileTemplateStore, LogEntry, LogSink, MemoryLog, OllamaClient,
    OllamaConfig, Pipeline, PipelineConfig, PipelineResponse, PromptComposer, RunOptions,
    SessionLog, SessionRecord, Stage, StageExecutor, collect_inputs, new_session_id,
};

#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(author, version, about = "Four-stage LLM pipeline turning raw source text into a news article", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on inline text and/or .txt files
    Run(RunArgs),

    /// Inspect or edit prompt templates
    Prompt {
        #[command(subcommand)]
        action: PromptAction,

        /// Directory holding <stage>.json templates
        #[arg(long, default_value = "prompts", global = true)]
        prompt_dir: PathBuf,
    },

    /// Check the model service and list installed models
    Check {
        /// Model service address, overriding OLLAMA_BASE_URL
        #[arg(long = "ollama-host", alias = "ollamaHost")]
        ollama_host: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Args)]
struct ArticleArgs {
    /// News category
    #[arg(long, default_value = "財經")]
    news_type: String,

    /// Target outlet style
    #[arg(long, default_value = "經濟日報")]
    target_style: String,

    /// Target word count
    #[arg(long, default_value = "800")]
    word_limit: u32,

    /// Free-text constraints
    #[arg(long)]
    constraints: Option<String>,

    /// Tone
    #[arg(long, default_value = "客觀中性")]
    tone: String,

    /// Supplementary answers as a JSON object
    #[arg(long)]
    additional_answers_json: Option<String>,
}

impl ArticleArgs {
    fn to_config(&self, raw_data: &str) -> Result<PipelineConfig> {
        let additional_answers = match &self.additional_answers_json {
            Some(text) => {
                let value: Value = serde_json::from_str(text)
                    .context("Failed to parse --additional-answers-json")?;
                match value {
                    Value::Object(map) => Some(map),
                    _ => bail!("--additional-answers-json must be a JSON object"),
                }
            }
            None => None,
        };

        Ok(PipelineConfig {
            raw_data: raw_data.to_string(),
            news_type: self.news_type.clone(),
            target_style: self.target_style.clone(),
            word_limit: self.word_limit,
            constraints: self.constraints.clone(),
            tone: self.tone.clone(),
            additional_answers,
        })
    }
}

#[derive(Args)]
struct RunArgs {
    /// Raw source text
    #[arg(long)]
    raw_data: Option<String>,

    /// Files or directories to process (.txt files only)
    #[arg(long, num_args = 1..)]
    files: Vec<PathBuf>,

    #[command(flatten)]
    article: ArticleArgs,

    /// Retry choices allowed per stage before advancing anyway
    #[arg(long, default_value = "2")]
    max_retries: u32,

    /// Accept every stage automatically
    #[arg(long)]
    non_interactive: bool,

    /// Log each composed prompt (first 1000 characters)
    #[arg(long)]
    show_prompts: bool,

    /// Use canned model responses instead of the model service
    #[arg(long)]
    mock: bool,

    /// Model service address, overriding OLLAMA_BASE_URL
    #[arg(long = "ollama-host", alias = "ollamaHost")]
    ollama_host: Option<String>,

    /// Model name, overriding OLLAMA_MODEL_NAME
    #[arg(long)]
    model: Option<String>,

    /// Directory holding <stage>.json templates
    #[arg(long, default_value = "prompts")]
    prompt_dir: PathBuf,

    /// Session CSV log
    #[arg(long, env = "PIPELINE_LOG_CSV", default_value = DEFAULT_LOG_CSV)]
    log_csv: PathBuf,

    /// Directory for per-session JSON detail files
    #[arg(long)]
    json_out_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum PromptAction {
    /// Print the composed prompt for a stage
    Show {
        /// alpha, beta, gamma or delta
        #[arg(long, value_parser = parse_stage)]
        stage: Stage,

        /// Sample source text for the {raw_data} placeholder
        #[arg(long, default_value = "")]
        raw_data: String,

        #[command(flatten)]
        article: ArticleArgs,
    },

    /// Validate and store an override for a stage
    SaveOverride {
        #[arg(long, value_parser = parse_stage)]
        stage: Stage,

        /// JSON file with the override sections
        #[arg(long)]
        file: PathBuf,
    },

    /// Delete a stage's override
    RemoveOverride {
        #[arg(long, value_parser = parse_stage)]
        stage: Stage,
    },
}

fn parse_stage(value: &str) -> Result<Stage, String> {
    Stage::from_name(value).ok_or_else(|| {
        format!(
            "unknown stage '{}' (expected alpha, beta, gamma or delta)",
            value
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            setup_logging(args.verbose);
            run_pipeline(args).await
        }
        Commands::Prompt { action, prompt_dir } => {
            setup_logging(false);
            prompt_command(action, prompt_dir)
        }
        Commands::Check {
            ollama_host,
            verbose,
        } => {
            setup_logging(verbose);
            check_service(ollama_host).await
        }
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn backend_config(ollama_host: Option<&str>) -> Result<OllamaConfig> {
    let config = OllamaConfig::from_env()?;
    Ok(match ollama_host {
        Some(host) => config.with_base_url(host),
        None => config,
    })
}

async fn run_pipeline(args: RunArgs) -> Result<()> {
    let inputs = collect_inputs(args.raw_data.as_deref(), &args.files);
    if inputs.is_empty() {
        bail!("No input to process: pass --raw-data or --files with .txt files");
    }

    let config = backend_config(args.ollama_host.as_deref())?;
    let backend: Option<Arc<dyn ChatBackend>> = if args.mock || config.mock {
        info!("Mock mode: model calls replaced by canned responses");
        None
    } else {
        info!(
            "Using model service at {} (model {})",
            config.base_url,
            args.model.as_deref().unwrap_or(&config.model)
        );
        Some(Arc::new(OllamaClient::new(config)?) as Arc<dyn ChatBackend>)
    };

    let store = FileTemplateStore::new(&args.prompt_dir);
    let composer = Arc::new(PromptComposer::new(Arc::new(store)));

    let mut session_log = SessionLog::new(&args.log_csv);
    if let Some(dir) = &args.json_out_dir {
        session_log = session_log.with_json_dir(dir);
    }

    let options = RunOptions {
        max_retries: args.max_retries,
        interactive: !args.non_interactive,
        show_prompt_preview: args.show_prompts,
        model_override: args.model.clone(),
    };

    info!("Processing {} input(s)", inputs.len());

    for input in inputs {
        let pipeline_config = args.article.to_config(&input.text)?;
        let start_time = Local::now();
        let session_id = new_session_id(start_time);

        let entries = Arc::new(MemoryLog::new());
        entries.log(LogEntry::new(INITIAL_STAGE, "config", pipeline_config.log_summary()));
        entries.log(LogEntry::new(
            INITIAL_STAGE,
            "source",
            json!({"source": input.source, "text_len": input.text.chars().count()}),
        ));

        let executor = match &backend {
            Some(backend) => StageExecutor::new(Arc::clone(backend)),
            None => StageExecutor::mock(),
        };
        let pipeline = Pipeline::new(Arc::clone(&composer), executor)
            .with_log(Arc::clone(&entries) as Arc<dyn LogSink>);

        info!("[{}] session {}", input.source, session_id);
        let mut console = ConsoleDecisions::new(std::io::stdin().lock(), std::io::stderr());
        let response = match pipeline.run(pipeline_config, &options, &mut console).await {
            Ok(outcome) => outcome.into_response(),
            Err(e) => {
                error!("[{}] pipeline failed: {}", input.source, e);
                PipelineResponse::failure(&e)
            }
        };

        let record = SessionRecord {
            session_id,
            start_time,
            end_time: Local::now(),
            raw_data: input.text.clone(),
            entries: entries.entries(),
            response,
        };
        match session_log.write(&record) {
            Ok(()) => info!(
                "[{}] {} written to {:?}",
                input.source,
                if record.response.success { "completed," } else { "failed or aborted," },
                session_log.csv_path()
            ),
            Err(e) => warn!("[{}] failed to write session log: {:#}", input.source, e),
        }

        println!("{}", serde_json::to_string_pretty(&record.response)?);
    }

    Ok(())
}

fn prompt_command(action: PromptAction, prompt_dir: PathBuf) -> Result<()> {
    let composer = PromptComposer::new(Arc::new(FileTemplateStore::new(&prompt_dir)));

    match action {
        PromptAction::Show {
            stage,
            raw_data,
            article,
        } => {
            let config = article.to_config(&raw_data)?;
            let context = preview_context(stage, &config);
            let selections = config.selections().restricted_to(stage.spec().axes);
            let preview = composer
                .preview(stage, &context, &selections, "")
                .with_context(|| format!("Failed to compose {} prompt", stage))?;

            for line in composer.preview_for_choice(&selections) {
                println!("{}", line);
            }
            println!("{}", preview);
        }
        PromptAction::SaveOverride { stage, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read file: {:?}", file))?;
            let data = match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(_) => from_relaxed_str(&text)
                    .with_context(|| format!("Failed to parse override JSON: {:?}", file))?,
            };
            composer
                .save_override(stage, &data)
                .with_context(|| format!("Failed to save {} override", stage))?;
            info!("Saved {} override under {:?}", stage, prompt_dir);
        }
        PromptAction::RemoveOverride { stage } => {
            composer
                .remove_override(stage)
                .with_context(|| format!("Failed to remove {} override", stage))?;
            info!("Removed {} override", stage);
        }
    }

    Ok(())
}

/// Stage context built from the config alone, with empty carried-forward fields
fn preview_context(stage: Stage, config: &PipelineConfig) -> PromptContext {
    let alpha = AlphaRecord::default();
    match stage {
        Stage::Alpha => alpha_context(config),
        Stage::Beta => beta_context(config, &alpha),
        Stage::Gamma => gamma_context(config, &alpha, ""),
        Stage::Delta => delta_context("", &GammaRecord::default(), ""),
    }
}

async fn check_service(ollama_host: Option<String>) -> Result<()> {
    let config = backend_config(ollama_host.as_deref())?;
    let client = OllamaClient::new(config)?;

    let status = client.check_connection().await;
    println!("Model Service");
    println!("=============");
    println!("Address: {}", client.config().base_url);
    println!("Default model: {}", client.config().model);
    println!("Status: {}", status.message);
    if let Some(ms) = status.response_time_ms {
        println!("Response time: {:.0}ms", ms);
    }

    if !status.connected {
        bail!("Model service unreachable");
    }

    let models = client
        .list_models()
        .await
        .context("Failed to list installed models")?;
    println!();
    println!("Installed Models");
    println!("----------------");
    for model in &models {
        println!("{} ({:.1} GB)", model.name, model.size as f64 / 1e9);
    }
    if !models.iter().any(|m| m.name == client.config().model) {
        warn!("Default model {} is not installed", client.config().model);
    }

    Ok(())
}
