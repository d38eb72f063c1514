use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::{
    AlphaRecord, BetaRecord, DeltaRecord, FinalRecord, GammaRecord, LogEntry, LogSink, NullLog,
    PipelineConfig, RunOptions, Stage, StageRecord,
};
use crate::pipeline::decision::{AutoDecisions, CategoryMenu, Decision, DecisionProvider};
use crate::prompts::{Axis, PromptComposer, PromptContext};
use crate::stages::{
    StageExecutor, StageOutcome, alpha_context, beta_context, check_language, delta_context,
    gamma_context, revision_directive,
};

const PREVIEW_CHARS: usize = 1000;

/// Reason recorded when the operator aborts
pub const CANCELLED: &str = "operator cancelled";

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed(FinalRecord),
    Aborted { stage: Stage, reason: String },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Completed(_))
    }

    pub fn into_response(self) -> PipelineResponse {
        match self {
            PipelineOutcome::Completed(record) => PipelineResponse {
                success: true,
                stage: None,
                message: None,
                data: Some(record),
            },
            PipelineOutcome::Aborted { stage, reason } => PipelineResponse {
                success: false,
                stage: Some(stage.name().to_string()),
                message: Some(reason),
                data: None,
            },
        }
    }
}

/// Result payload of a run as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<FinalRecord>,
}

impl PipelineResponse {
    /// Response for a run that failed before reaching a terminal state
    pub fn failure(error: &PipelineError) -> Self {
        let stage = match error {
            PipelineError::Transport { stage, .. } => Some(stage.name().to_string()),
            PipelineError::Template(_) => None,
        };
        Self {
            success: false,
            stage,
            message: Some(error.to_string()),
            data: None,
        }
    }
}

/// How a stage's retry loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Accepted,
    /// Unrecognised operator input, treated as accept
    Defaulted,
    /// Retry requested at the cap
    Capped,
    Cancelled,
}

/// What the loop does after one operator decision
enum Step {
    Done(Exit),
    Again,
}

/// Runs pipelines against a shared composer, executor and log sink.
///
/// Each stage loops compose, execute, log, ask. Retry repeats the stage
/// until its retry count reaches `max_retries`, then the run advances anyway.
pub struct Pipeline {
    composer: Arc<PromptComposer>,
    executor: StageExecutor,
    log: Arc<dyn LogSink>,
}

impl Pipeline {
    pub fn new(composer: Arc<PromptComposer>, executor: StageExecutor) -> Self {
        Self {
            composer,
            executor,
            log: Arc::new(NullLog),
        }
    }

    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// Run all four stages.
    ///
    /// When `options.interactive` is false the provider is ignored and every
    /// stage auto-accepts. Transport failures end the run with an error;
    /// parse failures never do.
    pub async fn run(
        &self,
        config: PipelineConfig,
        options: &RunOptions,
        decisions: &mut dyn DecisionProvider,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut auto = AutoDecisions;
        let decisions: &mut dyn DecisionProvider = if options.interactive {
            decisions
        } else {
            &mut auto
        };
        let mut config = config;

        info!(
            "Starting pipeline: news_type={}, target_style={}, tone={}, word_limit={}",
            config.news_type, config.target_style, config.tone, config.word_limit
        );

        // Alpha
        let context = alpha_context(&config);
        let mut attempt = 0;
        let alpha = loop {
            let outcome = self
                .attempt(Stage::Alpha, &config, &context, "", attempt, options)
                .await?;
            self.report(
                Stage::Alpha,
                outcome.record.summary(),
                outcome.record.language_fields(),
                attempt,
            );
            match self.decide(Stage::Alpha, &outcome, &mut attempt, options, decisions) {
                Step::Again => continue,
                Step::Done(Exit::Cancelled) => return Ok(aborted(Stage::Alpha)),
                Step::Done(_) => break into_alpha(outcome.record),
            }
        };
        info!("Alpha done: {} key points", alpha.key_points.len());

        // Beta
        let mut attempt = 0;
        let beta = loop {
            if options.interactive {
                self.reselect_categories(&mut config, decisions)?;
            }
            let context = beta_context(&config, &alpha);
            let outcome = self
                .attempt(Stage::Beta, &config, &context, "", attempt, options)
                .await?;
            self.report(
                Stage::Beta,
                outcome.record.summary(),
                outcome.record.language_fields(),
                attempt,
            );
            match self.decide(Stage::Beta, &outcome, &mut attempt, options, decisions) {
                Step::Again => continue,
                Step::Done(Exit::Cancelled) => return Ok(aborted(Stage::Beta)),
                Step::Done(_) => break into_beta(outcome.record),
            }
        };
        let styled_content = beta.styled_content;
        info!("Beta done: {} characters styled", styled_content.chars().count());

        // Gamma
        let context = gamma_context(&config, &alpha, &styled_content);
        let mut attempt = 0;
        let gamma = loop {
            let outcome = self
                .attempt(Stage::Gamma, &config, &context, "", attempt, options)
                .await?;
            self.report(
                Stage::Gamma,
                outcome.record.summary(),
                outcome.record.language_fields(),
                attempt,
            );
            match self.decide(Stage::Gamma, &outcome, &mut attempt, options, decisions) {
                Step::Again => continue,
                Step::Done(Exit::Cancelled) => return Ok(aborted(Stage::Gamma)),
                Step::Done(_) => break into_gamma(outcome.record),
            }
        };
        let selected_headline = decisions.choose_headline(&gamma.candidates(), &gamma.recommended);
        self.checkpoint(
            Stage::Gamma,
            "user_choice",
            json!({"selected_headline": selected_headline}),
        );
        info!("Gamma done: headline {:?}", selected_headline);

        // Delta
        let context = delta_context(&styled_content, &gamma, &selected_headline);
        let mut attempt = 0;
        let mut revision_notes = String::new();
        loop {
            let session_append = revision_directive(&revision_notes);
            let outcome = self
                .attempt(Stage::Delta, &config, &context, &session_append, attempt, options)
                .await?;
            let delta = into_delta(outcome.record.clone());
            let record = FinalRecord::assemble(&delta, &styled_content, &gamma, &selected_headline);
            self.report(Stage::Delta, record.summary(), record.language_fields(), attempt);

            let step = self.decide(Stage::Delta, &outcome, &mut attempt, options, decisions);
            let action = match step {
                Step::Again => {
                    revision_notes = decisions.revision_notes();
                    self.checkpoint(
                        Stage::Delta,
                        "param_change",
                        json!({"revision_notes": revision_notes}),
                    );
                    continue;
                }
                Step::Done(Exit::Cancelled) => return Ok(aborted(Stage::Delta)),
                Step::Done(Exit::Accepted) => "finalized",
                Step::Done(Exit::Capped) => "finalized_max_retries",
                Step::Done(Exit::Defaulted) => "finalized_default",
            };

            self.checkpoint(
                Stage::Delta,
                action,
                json!({
                    "best_title": record.best_title,
                    "final_body_len": record.final_body.chars().count(),
                }),
            );
            info!("Pipeline completed: {:?}", record.best_title);
            return Ok(PipelineOutcome::Completed(record));
        }
    }

    /// Compose, execute and log one stage attempt
    async fn attempt(
        &self,
        stage: Stage,
        config: &PipelineConfig,
        context: &PromptContext,
        session_append: &str,
        attempt: u32,
        options: &RunOptions,
    ) -> Result<StageOutcome, PipelineError> {
        let selections = config.selections().restricted_to(stage.spec().axes);
        let prompt = self
            .composer
            .compose(stage, context, &selections, session_append)?;

        if options.show_prompt_preview {
            info!(
                "{} prompt preview:\n{}",
                stage,
                prompt.preview_truncated(PREVIEW_CHARS)
            );
        }

        let outcome = self
            .executor
            .run_stage(stage, &prompt, options.model_override.as_deref())
            .await?;
        let attempt_no = attempt + 1;

        if outcome.used_fallback() {
            self.checkpoint(
                stage,
                "parse_error",
                json!({"response": outcome.raw_text, "attempt": attempt_no}),
            );
        }
        self.checkpoint(
            stage,
            "raw_output",
            json!({
                "prompt": {"system": prompt.system, "user": prompt.user},
                "response": outcome.raw_text,
                "attempt": attempt_no,
            }),
        );

        Ok(outcome)
    }

    /// Log the `ai_result` summary and the language check of one attempt
    fn report(
        &self,
        stage: Stage,
        mut summary: Value,
        fields: Vec<(&'static str, String)>,
        attempt: u32,
    ) {
        if let Value::Object(map) = &mut summary {
            map.insert("attempt".to_string(), json!(attempt + 1));
        }
        self.checkpoint(stage, "ai_result", summary);

        let checks: Map<String, Value> = fields
            .into_iter()
            .map(|(field, text)| (field.to_string(), json!(check_language(&text))))
            .collect();
        self.checkpoint(stage, "lang_check", Value::Object(checks));
    }

    /// Ask for the next move and apply the retry cap
    fn decide(
        &self,
        stage: Stage,
        outcome: &StageOutcome,
        attempt: &mut u32,
        options: &RunOptions,
        decisions: &mut dyn DecisionProvider,
    ) -> Step {
        let decision = decisions.choose_action(stage, &outcome.record, *attempt + 1);
        self.checkpoint(
            stage,
            "user_choice",
            json!({"choice": decision.log_value(), "attempt": *attempt + 1}),
        );

        match decision {
            Decision::Accept => Step::Done(Exit::Accepted),
            Decision::Unrecognized(input) => {
                info!("{}: unrecognised choice {:?}, accepting", stage, input);
                Step::Done(Exit::Defaulted)
            }
            Decision::Cancel => {
                warn!("{}: cancelled by operator", stage);
                Step::Done(Exit::Cancelled)
            }
            Decision::Retry => {
                *attempt += 1;
                if *attempt >= options.max_retries {
                    warn!(
                        "{}: retry limit {} reached, advancing",
                        stage, options.max_retries
                    );
                    self.checkpoint(
                        stage,
                        "capped_retry_advance",
                        json!({"attempt": *attempt, "max_retries": options.max_retries}),
                    );
                    Step::Done(Exit::Capped)
                } else {
                    info!("{}: retry {}/{}", stage, attempt, options.max_retries);
                    Step::Again
                }
            }
        }
    }

    /// Let the operator change news type, style and tone before a Beta attempt
    fn reselect_categories(
        &self,
        config: &mut PipelineConfig,
        decisions: &mut dyn DecisionProvider,
    ) -> Result<(), PipelineError> {
        let current = config.selections();
        let mut menus = Vec::with_capacity(Axis::ALL.len());
        for axis in Axis::ALL {
            menus.push(CategoryMenu {
                axis,
                options: self.composer.category_options(axis)?,
                current: current.get(axis).map(str::to_string),
            });
        }

        let chosen = decisions.choose_categorical_overrides(&menus);
        if config.apply_selections(&chosen) {
            info!(
                "Categories changed: news_type={}, target_style={}, tone={}",
                config.news_type, config.target_style, config.tone
            );
            self.checkpoint(
                Stage::Beta,
                "param_change",
                json!({
                    "news_type": config.news_type,
                    "target_style": config.target_style,
                    "tone": config.tone,
                }),
            );
        }
        Ok(())
    }

    fn checkpoint(&self, stage: Stage, action: &str, details: Value) {
        self.log.log(LogEntry::new(stage.label(), action, details));
    }
}

fn aborted(stage: Stage) -> PipelineOutcome {
    PipelineOutcome::Aborted {
        stage,
        reason: CANCELLED.to_string(),
    }
}

// The executor builds records from the stage's own table entry, so the
// variant always matches the stage that produced it.

fn into_alpha(record: StageRecord) -> AlphaRecord {
    match record {
        StageRecord::Alpha(record) => record,
        _ => AlphaRecord::default(),
    }
}

fn into_beta(record: StageRecord) -> BetaRecord {
    match record {
        StageRecord::Beta(record) => record,
        _ => BetaRecord::default(),
    }
}

fn into_gamma(record: StageRecord) -> GammaRecord {
    match record {
        StageRecord::Gamma(record) => record,
        _ => GammaRecord::default(),
    }
}

fn into_delta(record: StageRecord) -> DeltaRecord {
    match record {
        StageRecord::Delta(record) => record,
        _ => DeltaRecord::default(),
    }
}
