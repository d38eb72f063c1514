use crate::models::{HeadlineCandidate, Stage, StageRecord};
use crate::prompts::{Axis, Selections};

/// Operator choice at a stage boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Retry,
    Cancel,
    /// Input the menu did not recognise; treated as accept
    Unrecognized(String),
}

impl Decision {
    /// Value recorded in `user_choice` checkpoints
    pub fn log_value(&self) -> &str {
        match self {
            Decision::Accept => "accept",
            Decision::Retry => "retry",
            Decision::Cancel => "cancel",
            Decision::Unrecognized(input) => input,
        }
    }
}

/// Options offered when re-selecting one categorical axis
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMenu {
    pub axis: Axis,
    /// Known labels, in template order
    pub options: Vec<String>,
    pub current: Option<String>,
}

/// Source of operator decisions for a pipeline run
///
/// Calls are synchronous and happen only between stage attempts.
pub trait DecisionProvider {
    /// Accept, retry or cancel after a stage attempt
    fn choose_action(&mut self, stage: Stage, record: &StageRecord, attempt: u32) -> Decision;

    /// Headline to carry into Delta
    fn choose_headline(&mut self, candidates: &[HeadlineCandidate], recommended: &str) -> String;

    /// New labels before a Beta attempt; `None` keeps the current label
    fn choose_categorical_overrides(&mut self, menus: &[CategoryMenu]) -> Selections;

    /// Free-text instructions for the next Delta attempt
    fn revision_notes(&mut self) -> String;
}

/// Unattended decisions: accept everything, keep every default
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoDecisions;

impl DecisionProvider for AutoDecisions {
    fn choose_action(&mut self, _stage: Stage, _record: &StageRecord, _attempt: u32) -> Decision {
        Decision::Accept
    }

    fn choose_headline(&mut self, candidates: &[HeadlineCandidate], recommended: &str) -> String {
        default_headline(candidates, recommended)
    }

    fn choose_categorical_overrides(&mut self, _menus: &[CategoryMenu]) -> Selections {
        Selections::default()
    }

    fn revision_notes(&mut self) -> String {
        String::new()
    }
}

/// The recommended candidate, else the first one, else the bare recommendation
pub fn default_headline(candidates: &[HeadlineCandidate], recommended: &str) -> String {
    candidates
        .iter()
        .find(|c| c.recommended)
        .or_else(|| candidates.first())
        .map(|c| c.text.clone())
        .unwrap_or_else(|| recommended.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(kind: &str, text: &str, recommended: bool) -> HeadlineCandidate {
        HeadlineCandidate {
            kind: kind.to_string(),
            text: text.to_string(),
            recommended,
        }
    }

    #[test]
    fn test_default_headline() {
        let candidates = vec![candidate("news", "A", false), candidate("data", "B", true)];
        assert_eq!(default_headline(&candidates, "B"), "B");

        let candidates = vec![candidate("news", "A", false), candidate("data", "B", false)];
        assert_eq!(default_headline(&candidates, "C"), "A");

        assert_eq!(default_headline(&[], "C"), "C");
    }

    #[test]
    fn test_decision_log_value() {
        assert_eq!(Decision::Retry.log_value(), "retry");
        assert_eq!(Decision::Unrecognized("x".to_string()).log_value(), "x");
    }
}
