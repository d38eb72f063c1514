use std::path::PathBuf;

use thiserror::Error;

use crate::models::Stage;

/// Model output could not be coerced into a JSON object.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Failed to parse JSON after repairs: {}", errors.join("; "))]
pub struct ParseFailure {
    /// Up to three underlying parser messages
    pub errors: Vec<String>,
}

/// The model backend could not be reached or answered with an error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to send request to model backend: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model backend error: {status} - {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed model backend response: {0}")]
    MalformedResponse(String),
}

/// Template storage and override validation errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed template file {path:?}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Invalid prompt override: {0}")]
    InvalidOverride(String),
}

/// Errors that end a pipeline run before it reaches a terminal state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage model call failed: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),
}
