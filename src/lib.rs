pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod stages;

pub use error::{ParseFailure, PipelineError, TemplateError, TransportError};
pub use io::{SessionLog, SessionRecord, SourceText, collect_inputs, new_session_id};
pub use llm::{ChatBackend, ChatRequest, OllamaClient, OllamaConfig, parse_model_output};
pub use models::{
    FinalRecord, LogEntry, LogSink, MemoryLog, NullLog, PipelineConfig, RunOptions, Stage,
    StageRecord,
};
pub use pipeline::{
    AutoDecisions, ConsoleDecisions, Decision, DecisionProvider, Pipeline, PipelineOutcome,
    PipelineResponse,
};
pub use prompts::{
    ComposedPrompt, FileTemplateStore, MemoryTemplateStore, PromptComposer, PromptContext,
    Selections, TemplateStore,
};
pub use stages::{StageExecutor, StageOutcome};
