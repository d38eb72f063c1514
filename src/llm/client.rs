use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3:8b";

/// A system + user prompt pair sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    /// Model name overriding the backend default
    pub model: Option<String>,
}

/// Black-box model capability: send messages, receive text
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn invoke(&self, request: &ChatRequest) -> Result<String, TransportError>;
}

/// Configuration for the Ollama chat backend
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Service address (from OLLAMA_BASE_URL)
    pub base_url: String,
    /// Default model (from OLLAMA_MODEL_NAME)
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Optional request timeout (from OLLAMA_TIMEOUT_SECS)
    pub timeout: Option<Duration>,
    /// Replace every model call with canned responses (from OLLAMA_MOCK)
    pub mock: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            timeout: None,
            mock: false,
        }
    }
}

impl OllamaConfig {
    /// Create config from environment variables, read once at startup
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.base_url = normalize_base_url(&url);
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL_NAME") {
            config.model = model;
        }
        if let Ok(secs) = std::env::var("OLLAMA_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid OLLAMA_TIMEOUT_SECS value: {:?}", secs))?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        config.mock = std::env::var("OLLAMA_MOCK")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Add a scheme when missing and drop trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };
    url.trim_end_matches('/').to_string()
}

/// Ollama chat API client
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Check that the service answers, and how fast
    pub async fn check_connection(&self) -> ConnectionStatus {
        let url = format!("{}/api/tags", self.config.base_url);
        let started = Instant::now();
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => ConnectionStatus {
                connected: true,
                response_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
                message: format!("Connected to {}", self.config.base_url),
            },
            Ok(response) => ConnectionStatus {
                connected: false,
                response_time_ms: None,
                message: format!("Service answered with status {}", response.status()),
            },
            Err(e) if e.is_timeout() => ConnectionStatus {
                connected: false,
                response_time_ms: None,
                message: format!("Connection to {} timed out", self.config.base_url),
            },
            Err(e) => ConnectionStatus {
                connected: false,
                response_time_ms: None,
                message: format!("Cannot reach {}: {}", self.config.base_url, e),
            },
        }
    }

    /// List models installed on the service
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        Ok(tags.models)
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn invoke(&self, request: &ChatRequest) -> Result<String, TransportError> {
        let body = OllamaChatRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        Ok(response.message.content)
    }
}

/// Result of a connectivity check
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub response_time_ms: Option<f64>,
    pub message: String,
}

/// A model installed on the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub digest: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}
