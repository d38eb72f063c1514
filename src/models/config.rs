use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::prompts::Selections;

pub const DEFAULT_NEWS_TYPE: &str = "財經";
pub const DEFAULT_TARGET_STYLE: &str = "經濟日報";
pub const DEFAULT_TONE: &str = "客觀中性";
pub const DEFAULT_WORD_LIMIT: u32 = 800;

/// Per-run parameters supplied at pipeline start
///
/// Only the three categorical fields may change during a run, and only when
/// the operator re-selects them before a Beta attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw source text to turn into an article
    pub raw_data: String,
    /// News category label (e.g. "財經")
    pub news_type: String,
    /// Target outlet style label (e.g. "經濟日報")
    pub target_style: String,
    /// Target word count
    pub word_limit: u32,
    /// Free-text constraints
    pub constraints: Option<String>,
    /// Tone label (e.g. "客觀中性")
    pub tone: String,
    /// Structured supplementary answers
    pub additional_answers: Option<Map<String, Value>>,
}

impl PipelineConfig {
    pub fn new(raw_data: impl Into<String>) -> Self {
        Self {
            raw_data: raw_data.into(),
            news_type: DEFAULT_NEWS_TYPE.to_string(),
            target_style: DEFAULT_TARGET_STYLE.to_string(),
            word_limit: DEFAULT_WORD_LIMIT,
            constraints: None,
            tone: DEFAULT_TONE.to_string(),
            additional_answers: None,
        }
    }

    /// Current categorical labels
    pub fn selections(&self) -> Selections {
        Selections {
            news_type: Some(self.news_type.clone()),
            target_style: Some(self.target_style.clone()),
            tone: Some(self.tone.clone()),
        }
    }

    /// Replace the categorical labels; unset selections keep their value.
    /// Returns true if anything changed.
    pub fn apply_selections(&mut self, selections: &Selections) -> bool {
        let before = (
            self.news_type.clone(),
            self.target_style.clone(),
            self.tone.clone(),
        );
        if let Some(news_type) = &selections.news_type {
            self.news_type = news_type.clone();
        }
        if let Some(target_style) = &selections.target_style {
            self.target_style = target_style.clone();
        }
        if let Some(tone) = &selections.tone {
            self.tone = tone.clone();
        }
        before != (
            self.news_type.clone(),
            self.target_style.clone(),
            self.tone.clone(),
        )
    }

    /// Config summary for the session log, without the source text
    pub fn log_summary(&self) -> Value {
        serde_json::json!({
            "news_type": self.news_type,
            "target_style": self.target_style,
            "word_limit": self.word_limit,
            "constraints": self.constraints,
            "tone": self.tone,
        })
    }
}

/// Options controlling a single pipeline run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Retry choices allowed per stage before a forced advance
    pub max_retries: u32,
    /// Ask the decision provider; otherwise every stage auto-accepts
    pub interactive: bool,
    /// Log each composed prompt before sending it
    pub show_prompt_preview: bool,
    /// Model name overriding the backend default
    pub model_override: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            interactive: false,
            show_prompt_preview: false,
            model_override: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::new("source");
        assert_eq!(config.news_type, DEFAULT_NEWS_TYPE);
        assert_eq!(config.word_limit, 800);
        assert!(config.constraints.is_none());
    }

    #[test]
    fn test_apply_selections_reports_change() {
        let mut config = PipelineConfig::new("source");
        let current = config.selections();
        assert!(!config.apply_selections(&current));

        let changed = config.apply_selections(&Selections {
            news_type: None,
            target_style: Some("中央社".to_string()),
            tone: None,
        });
        assert!(changed);
        assert_eq!(config.target_style, "中央社");
        assert_eq!(config.news_type, DEFAULT_NEWS_TYPE);
    }

    #[test]
    fn test_run_options_default() {
        let options = RunOptions::default();
        assert_eq!(options.max_retries, 2);
        assert!(!options.interactive);
    }
}
