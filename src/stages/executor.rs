use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ParseFailure, PipelineError};
use crate::llm::{ChatBackend, ChatRequest, parse_model_output};
use crate::models::{Stage, StageRecord};
use crate::prompts::ComposedPrompt;

/// How a stage record was obtained from the model output
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// The repair parser accepted the whole response
    Parsed,
    /// Only the slice between the first `{` and the last `}` parsed
    Sliced,
    /// Nothing parsed; the record is the stage's fallback
    Fallback(ParseFailure),
}

/// One stage attempt's record plus the raw text it came from
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub record: StageRecord,
    pub raw_text: String,
    pub recovery: Recovery,
}

impl StageOutcome {
    pub fn used_fallback(&self) -> bool {
        matches!(self.recovery, Recovery::Fallback(_))
    }
}

/// Runs a single stage: model call, response repair, fallback
pub struct StageExecutor {
    /// `None` runs in mock mode
    backend: Option<Arc<dyn ChatBackend>>,
}

impl StageExecutor {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Executor answering every stage with its canned response
    pub fn mock() -> Self {
        Self { backend: None }
    }

    /// Execute one stage attempt.
    ///
    /// Parse failures never surface here: they end in the stage's fallback
    /// record. Only a transport failure is returned as an error.
    pub async fn run_stage(
        &self,
        stage: Stage,
        prompt: &ComposedPrompt,
        model: Option<&str>,
    ) -> Result<StageOutcome, PipelineError> {
        let raw_text = match &self.backend {
            None => {
                debug!("{}: mock mode, using canned response", stage);
                stage.spec().mock_response.to_string()
            }
            Some(backend) => {
                let request = ChatRequest {
                    system: prompt.system.clone(),
                    user: prompt.user.clone(),
                    model: model.map(str::to_string),
                };
                info!("{}: calling model", stage);
                backend
                    .invoke(&request)
                    .await
                    .map_err(|source| PipelineError::Transport { stage, source })?
            }
        };

        let (record, recovery) = parse_stage_output(stage, &raw_text);
        Ok(StageOutcome {
            record,
            raw_text,
            recovery,
        })
    }
}

/// Turn raw model text into a stage record; never fails
pub fn parse_stage_output(stage: Stage, raw_text: &str) -> (StageRecord, Recovery) {
    let spec = stage.spec();

    let failure = match parse_model_output(raw_text) {
        Ok(map) => return ((spec.parse)(&map), Recovery::Parsed),
        Err(failure) => failure,
    };
    warn!("{}: response did not parse ({}), trying brace slice", stage, failure);

    let trimmed = raw_text.trim();
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            if let Ok(map) = parse_model_output(&trimmed[start..=end]) {
                info!("{}: recovered record from brace slice", stage);
                return ((spec.parse)(&map), Recovery::Sliced);
            }
        }
    }

    warn!("{}: using fallback record", stage);
    ((spec.fallback)(trimmed), Recovery::Fallback(failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::models::HEADLINE_FAILED;
    use async_trait::async_trait;

    struct Echo(&'static str);

    #[async_trait]
    impl ChatBackend for Echo {
        async fn invoke(&self, _request: &ChatRequest) -> Result<String, TransportError> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl ChatBackend for Down {
        async fn invoke(&self, _request: &ChatRequest) -> Result<String, TransportError> {
            Err(TransportError::MalformedResponse("connection reset".to_string()))
        }
    }

    fn prompt() -> ComposedPrompt {
        ComposedPrompt {
            system: "s".to_string(),
            user: "u".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_mode_is_deterministic() {
        let executor = StageExecutor::mock();
        for stage in Stage::ALL {
            let first = executor.run_stage(stage, &prompt(), None).await.unwrap();
            let second = executor.run_stage(stage, &prompt(), None).await.unwrap();
            assert_eq!(first.raw_text, second.raw_text);
            assert_eq!(first.record, second.record);
            assert_eq!(first.recovery, Recovery::Parsed);
            assert_eq!(first.record.stage(), stage);
        }
    }

    #[tokio::test]
    async fn test_backend_output_is_parsed() {
        let executor = StageExecutor::new(Arc::new(Echo(
            r#"Sure! {"styled_content": "styled", "tone_score": 8.7, "extra": 1}"#,
        )));
        let outcome = executor.run_stage(Stage::Beta, &prompt(), None).await.unwrap();
        match outcome.record {
            StageRecord::Beta(record) => {
                assert_eq!(record.styled_content, "styled");
                assert_eq!(record.tone_score, 8);
                assert_eq!(record.quality_score, 0);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let executor = StageExecutor::new(Arc::new(Down));
        let err = executor.run_stage(Stage::Gamma, &prompt(), None).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Transport {
                stage: Stage::Gamma,
                ..
            }
        ));
    }

    #[test]
    fn test_brace_slice_recovery() {
        // The naive balance finder stops at the quoted brace; the wider slice parses
        let raw = r#"note {"draft_content": "a } b", "key_points": ["x"]} end"#;
        let (record, recovery) = parse_stage_output(Stage::Alpha, raw);
        assert_eq!(recovery, Recovery::Sliced);
        match record {
            StageRecord::Alpha(record) => {
                assert_eq!(record.draft_content, "a } b");
                assert_eq!(record.key_points, vec!["x".to_string()]);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_fallback_record() {
        let raw = "x".repeat(500);
        let (record, recovery) = parse_stage_output(Stage::Gamma, &raw);
        assert!(matches!(recovery, Recovery::Fallback(_)));
        assert!(record.needs_retry());
        match record {
            StageRecord::Gamma(record) => {
                assert_eq!(record.recommended, HEADLINE_FAILED);
                assert_eq!(record.headline_rationale.chars().count(), 300);
                assert_eq!(record.quality_score, 0);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_fallback_budget_ignores_surrounding_whitespace() {
        let raw = format!("\n\n{}{}\n", " ".repeat(400), "字".repeat(900));
        let (record, _) = parse_stage_output(Stage::Alpha, &raw);
        match record {
            StageRecord::Alpha(record) => {
                assert_eq!(record.draft_content, "字".repeat(800));
                assert_eq!(record.word_count, 800);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_fallback_on_empty_output() {
        let (record, recovery) = parse_stage_output(Stage::Delta, "");
        assert!(matches!(recovery, Recovery::Fallback(_)));
        assert_eq!(record.stage(), Stage::Delta);
        assert!(record.needs_retry());
    }
}
