use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::models::Stage;

/// Recommended headline used when Gamma output could not be parsed
pub const HEADLINE_FAILED: &str = "[headline generation failed]";

/// Alpha output: structured first draft
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlphaRecord {
    pub draft_content: String,
    pub key_points: Vec<String>,
    pub word_count: u64,
    pub info_hierarchy: Map<String, Value>,
    pub completeness_score: i64,
    pub analysis_notes: Vec<String>,
    pub quality_score: i64,
    pub needs_retry: bool,
}

impl AlphaRecord {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            draft_content: string_field(map, "draft_content").unwrap_or(d.draft_content),
            key_points: list_field(map, "key_points").unwrap_or(d.key_points),
            word_count: count_field(map, "word_count").unwrap_or(d.word_count),
            info_hierarchy: object_field(map, "info_hierarchy").unwrap_or(d.info_hierarchy),
            completeness_score: int_field(map, "completeness_score")
                .unwrap_or(d.completeness_score),
            analysis_notes: list_field(map, "analysis_notes").unwrap_or(d.analysis_notes),
            quality_score: int_field(map, "quality_score").unwrap_or(d.quality_score),
            needs_retry: bool_field(map, "needs_retry").unwrap_or(d.needs_retry),
        }
    }

    pub fn fallback(raw: &str, max_chars: usize) -> Self {
        let draft = truncate_chars(raw, max_chars);
        Self {
            word_count: draft.chars().count() as u64,
            draft_content: draft,
            needs_retry: true,
            ..Self::default()
        }
    }
}

/// Beta output: draft restyled for the target outlet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BetaRecord {
    pub styled_content: String,
    pub style_changes: Vec<String>,
    pub word_count: u64,
    pub tone_score: i64,
    pub readability_score: i64,
    pub style_notes: Vec<String>,
    pub quality_score: i64,
    pub needs_retry: bool,
}

impl BetaRecord {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            styled_content: string_field(map, "styled_content").unwrap_or(d.styled_content),
            style_changes: list_field(map, "style_changes").unwrap_or(d.style_changes),
            word_count: count_field(map, "word_count").unwrap_or(d.word_count),
            tone_score: int_field(map, "tone_score").unwrap_or(d.tone_score),
            readability_score: int_field(map, "readability_score")
                .unwrap_or(d.readability_score),
            style_notes: list_field(map, "style_notes").unwrap_or(d.style_notes),
            quality_score: int_field(map, "quality_score").unwrap_or(d.quality_score),
            needs_retry: bool_field(map, "needs_retry").unwrap_or(d.needs_retry),
        }
    }

    pub fn fallback(raw: &str, max_chars: usize) -> Self {
        let styled = truncate_chars(raw, max_chars);
        Self {
            word_count: styled.chars().count() as u64,
            styled_content: styled,
            needs_retry: true,
            ..Self::default()
        }
    }
}

/// Gamma output: headline variants keyed by headline type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GammaRecord {
    pub headline_options: IndexMap<String, String>,
    pub recommended: String,
    pub seo_keywords: Vec<String>,
    pub headline_rationale: String,
    pub appeal_score: i64,
    pub quality_score: i64,
    pub needs_retry: bool,
}

impl GammaRecord {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let d = Self::default();
        let headline_options = match map.get("headline_options") {
            Some(Value::Object(options)) => options
                .iter()
                .filter_map(|(kind, text)| text.as_str().map(|t| (kind.clone(), t.to_string())))
                .collect(),
            _ => d.headline_options,
        };
        Self {
            headline_options,
            recommended: string_field(map, "recommended").unwrap_or(d.recommended),
            seo_keywords: list_field(map, "seo_keywords").unwrap_or(d.seo_keywords),
            headline_rationale: string_field(map, "headline_rationale")
                .unwrap_or(d.headline_rationale),
            appeal_score: int_field(map, "appeal_score").unwrap_or(d.appeal_score),
            quality_score: int_field(map, "quality_score").unwrap_or(d.quality_score),
            needs_retry: bool_field(map, "needs_retry").unwrap_or(d.needs_retry),
        }
    }

    pub fn fallback(raw: &str, max_chars: usize) -> Self {
        Self {
            recommended: HEADLINE_FAILED.to_string(),
            headline_rationale: truncate_chars(raw, max_chars),
            needs_retry: true,
            ..Self::default()
        }
    }

    /// Headline candidates in model order
    pub fn candidates(&self) -> Vec<HeadlineCandidate> {
        self.headline_options
            .iter()
            .map(|(kind, text)| HeadlineCandidate {
                kind: kind.clone(),
                text: text.clone(),
                recommended: *text == self.recommended,
            })
            .collect()
    }
}

/// A headline variant offered to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineCandidate {
    pub kind: String,
    pub text: String,
    /// Whether the model marked this variant as its recommendation
    pub recommended: bool,
}

/// Delta output: final review of the styled article
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub final_content: Option<String>,
    pub refined_content: Option<String>,
    pub selected_headline: Option<String>,
    pub quality_report: Map<String, Value>,
    pub publish_ready: bool,
    pub needs_retry: bool,
}

impl DeltaRecord {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            final_content: string_field(map, "final_content"),
            refined_content: string_field(map, "refined_content"),
            selected_headline: string_field(map, "selected_headline"),
            quality_report: object_field(map, "quality_report").unwrap_or(d.quality_report),
            publish_ready: bool_field(map, "publish_ready").unwrap_or(d.publish_ready),
            needs_retry: bool_field(map, "needs_retry").unwrap_or(d.needs_retry),
        }
    }

    pub fn fallback(raw: &str, max_chars: usize) -> Self {
        let body = truncate_chars(raw, max_chars);
        let report = json!({
            "word_count": body.chars().count(),
            "compliance_check": "Response was not JSON; degraded content used.",
            "readability_score": 0,
            "professionalism_score": 0,
            "issues_found": ["Model did not return strict JSON"],
            "corrections_made": [],
        });
        Self {
            final_content: Some(body),
            quality_report: report.as_object().cloned().unwrap_or_default(),
            needs_retry: true,
            ..Self::default()
        }
    }
}

/// One stage attempt's output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageRecord {
    Alpha(AlphaRecord),
    Beta(BetaRecord),
    Gamma(GammaRecord),
    Delta(DeltaRecord),
}

impl StageRecord {
    pub fn stage(&self) -> Stage {
        match self {
            StageRecord::Alpha(_) => Stage::Alpha,
            StageRecord::Beta(_) => Stage::Beta,
            StageRecord::Gamma(_) => Stage::Gamma,
            StageRecord::Delta(_) => Stage::Delta,
        }
    }

    /// Model hint that another attempt may help; never acted on mechanically
    pub fn needs_retry(&self) -> bool {
        match self {
            StageRecord::Alpha(r) => r.needs_retry,
            StageRecord::Beta(r) => r.needs_retry,
            StageRecord::Gamma(r) => r.needs_retry,
            StageRecord::Delta(r) => r.needs_retry,
        }
    }

    /// Model-reported quality score, if the stage has one
    pub fn quality_score(&self) -> Option<i64> {
        match self {
            StageRecord::Alpha(r) => Some(r.quality_score),
            StageRecord::Beta(r) => Some(r.quality_score),
            StageRecord::Gamma(r) => Some(r.quality_score),
            StageRecord::Delta(_) => None,
        }
    }

    /// Compact summary logged as the `ai_result` checkpoint
    pub fn summary(&self) -> Value {
        match self {
            StageRecord::Alpha(r) => json!({
                "quality_score": r.quality_score,
                "word_count": r.word_count,
                "key_points": r.key_points,
                "needs_retry": r.needs_retry,
            }),
            StageRecord::Beta(r) => json!({
                "quality_score": r.quality_score,
                "word_count": r.word_count,
                "tone_score": r.tone_score,
                "readability_score": r.readability_score,
            }),
            StageRecord::Gamma(r) => json!({
                "headline_types": r.headline_options.keys().collect::<Vec<_>>(),
                "recommended": r.recommended,
            }),
            StageRecord::Delta(r) => json!({
                "publishable": r.publish_ready,
            }),
        }
    }

    /// Text fields checked by the language-consistency heuristic
    pub fn language_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            StageRecord::Alpha(r) => vec![
                ("draft_content", r.draft_content.clone()),
                ("key_points", r.key_points.join(" ")),
                ("info_hierarchy", Value::Object(r.info_hierarchy.clone()).to_string()),
                ("analysis_notes", r.analysis_notes.join(" ")),
            ],
            StageRecord::Beta(r) => vec![
                ("styled_content", r.styled_content.clone()),
                ("style_changes", r.style_changes.join(" ")),
                ("style_notes", r.style_notes.join(" ")),
            ],
            StageRecord::Gamma(r) => vec![
                (
                    "headline_options",
                    serde_json::to_string(&r.headline_options).unwrap_or_default(),
                ),
                ("recommended", r.recommended.clone()),
                ("headline_rationale", r.headline_rationale.clone()),
            ],
            StageRecord::Delta(r) => vec![
                ("final_content", r.final_content.clone().unwrap_or_default()),
                ("selected_headline", r.selected_headline.clone().unwrap_or_default()),
                ("quality_report", Value::Object(r.quality_report.clone()).to_string()),
            ],
        }
    }
}

/// The article produced by a completed run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalRecord {
    pub final_body: String,
    pub best_title: String,
    pub headline_options: IndexMap<String, String>,
    pub seo_keywords: Vec<String>,
    pub quality_report: Map<String, Value>,
    pub publishable: bool,
}

impl FinalRecord {
    /// Assemble the final article from the last Delta attempt and the
    /// carried-forward Beta and Gamma state
    pub fn assemble(
        delta: &DeltaRecord,
        styled_content: &str,
        gamma: &GammaRecord,
        selected_headline: &str,
    ) -> Self {
        let final_body = delta
            .refined_content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .or(delta.final_content.as_deref())
            .unwrap_or(styled_content)
            .to_string();

        Self {
            final_body,
            best_title: delta
                .selected_headline
                .clone()
                .unwrap_or_else(|| selected_headline.to_string()),
            headline_options: gamma.headline_options.clone(),
            seo_keywords: gamma.seo_keywords.clone(),
            quality_report: delta.quality_report.clone(),
            publishable: delta.publish_ready,
        }
    }

    /// `ai_result` summary for the Delta stage
    pub fn summary(&self) -> Value {
        json!({
            "publishable": self.publishable,
            "seo_keywords": self.seo_keywords,
        })
    }

    /// Delta's language check covers the assembled article, not the raw reply
    pub fn language_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("final_body", self.final_body.clone()),
            ("best_title", self.best_title.clone()),
            ("quality_report", Value::Object(self.quality_report.clone()).to_string()),
        ]
    }
}

/// Keep at most `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)?.as_str().map(str::to_string)
}

fn list_field(map: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items = map.get(key)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect(),
    )
}

fn int_field(map: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = map.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn count_field(map: &Map<String, Value>, key: &str) -> Option<u64> {
    int_field(map, key).map(|n| n.max(0) as u64)
}

fn bool_field(map: &Map<String, Value>, key: &str) -> Option<bool> {
    map.get(key)?.as_bool()
}

fn object_field(map: &Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    map.get(key)?.as_object().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_alpha_missing_and_mistyped_fields_take_defaults() {
        let record = AlphaRecord::from_map(&map(json!({
            "draft_content": "draft",
            "key_points": "not a list",
            "quality_score": 7.9,
            "needs_retry": "yes",
            "unexpected": 1
        })));

        assert_eq!(record.draft_content, "draft");
        assert!(record.key_points.is_empty());
        assert_eq!(record.quality_score, 7);
        assert!(!record.needs_retry);
        assert_eq!(record.completeness_score, 0);
    }

    #[test]
    fn test_fallback_truncates_by_characters() {
        let raw = "長".repeat(900);
        let record = AlphaRecord::fallback(&raw, 800);
        assert_eq!(record.draft_content.chars().count(), 800);
        assert_eq!(record.word_count, 800);
        assert_eq!(record.quality_score, 0);
        assert!(record.needs_retry);
    }

    #[test]
    fn test_gamma_keeps_headline_order_and_flags_recommended() {
        let record = GammaRecord::from_map(&map(json!({
            "headline_options": {"trend": "B", "data": "A", "bad": 3},
            "recommended": "A"
        })));

        let candidates = record.candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].kind, "trend");
        assert!(!candidates[0].recommended);
        assert!(candidates[1].recommended);
    }

    #[test]
    fn test_gamma_fallback() {
        let record = GammaRecord::fallback("oops", 300);
        assert_eq!(record.recommended, HEADLINE_FAILED);
        assert_eq!(record.headline_rationale, "oops");
        assert!(record.headline_options.is_empty());
        assert!(record.needs_retry);
    }

    #[test]
    fn test_final_record_prefers_refined_content() {
        let gamma = GammaRecord::default();
        let delta = DeltaRecord {
            final_content: Some("final".to_string()),
            refined_content: Some("refined".to_string()),
            ..Default::default()
        };
        let record = FinalRecord::assemble(&delta, "styled", &gamma, "chosen");
        assert_eq!(record.final_body, "refined");
        assert_eq!(record.best_title, "chosen");

        let blank_refined = DeltaRecord {
            refined_content: Some("   ".to_string()),
            ..Default::default()
        };
        let record = FinalRecord::assemble(&blank_refined, "styled", &gamma, "chosen");
        assert_eq!(record.final_body, "styled");
    }

    #[test]
    fn test_delta_fallback_zeroes_scores() {
        let record = DeltaRecord::fallback("plain text answer", 1200);
        assert_eq!(record.final_content.as_deref(), Some("plain text answer"));
        assert_eq!(record.quality_report["readability_score"], json!(0));
        assert!(!record.publish_ready);
        assert!(record.needs_retry);
    }
}
