use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{AlphaRecord, BetaRecord, DeltaRecord, GammaRecord, StageRecord};
use crate::prompts::Axis;

/// The four sequential pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Structures raw source text into a draft
    Alpha,
    /// Adapts the draft to the target outlet style
    Beta,
    /// Generates headline candidates
    Gamma,
    /// Final quality review
    Delta,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Alpha, Stage::Beta, Stage::Gamma, Stage::Delta];

    /// Lowercase identifier, used for template files and result payloads
    pub fn name(self) -> &'static str {
        match self {
            Stage::Alpha => "alpha",
            Stage::Beta => "beta",
            Stage::Gamma => "gamma",
            Stage::Delta => "delta",
        }
    }

    /// Capitalized label, used in log entries and menus
    pub fn label(self) -> &'static str {
        match self {
            Stage::Alpha => "Alpha",
            Stage::Beta => "Beta",
            Stage::Gamma => "Gamma",
            Stage::Delta => "Delta",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Stage::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    /// The stage that follows this one, if any
    pub fn next(self) -> Option<Self> {
        match self {
            Stage::Alpha => Some(Stage::Beta),
            Stage::Beta => Some(Stage::Gamma),
            Stage::Gamma => Some(Stage::Delta),
            Stage::Delta => None,
        }
    }

    pub fn spec(self) -> &'static StageSpec {
        match self {
            Stage::Alpha => &ALPHA_SPEC,
            Stage::Beta => &BETA_SPEC,
            Stage::Gamma => &GAMMA_SPEC,
            Stage::Delta => &DELTA_SPEC,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-stage table entry replacing ad hoc branching on stage names
pub struct StageSpec {
    pub stage: Stage,
    /// Categorical axes whose fragments are merged into this stage's prompt
    pub axes: &'static [Axis],
    /// Character budget for raw text kept in a fallback record
    pub fallback_chars: usize,
    /// Canned model response returned in mock mode
    pub mock_response: &'static str,
    /// Builds the stage record from a parsed mapping
    pub parse: fn(&Map<String, Value>) -> StageRecord,
    /// Builds the minimal record used when nothing parses
    pub fallback: fn(&str) -> StageRecord,
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("stage", &self.stage)
            .field("axes", &self.axes)
            .field("fallback_chars", &self.fallback_chars)
            .finish_non_exhaustive()
    }
}

static ALPHA_SPEC: StageSpec = StageSpec {
    stage: Stage::Alpha,
    axes: &[Axis::NewsType, Axis::TargetStyle, Axis::Tone],
    fallback_chars: 800,
    mock_response: r#"{"draft_content": "模擬初稿", "key_points": ["重點一"], "quality_score": 10, "needs_retry": false, "word_count": 100, "info_hierarchy": {}, "completeness_score": 10, "analysis_notes": []}"#,
    parse: parse_alpha,
    fallback: fallback_alpha,
};

static BETA_SPEC: StageSpec = StageSpec {
    stage: Stage::Beta,
    axes: &[Axis::TargetStyle, Axis::Tone],
    fallback_chars: 800,
    mock_response: r#"{"styled_content": "模擬風格化內容", "quality_score": 10, "word_count": 120, "tone_score": 9, "readability_score": 80}"#,
    parse: parse_beta,
    fallback: fallback_beta,
};

static GAMMA_SPEC: StageSpec = StageSpec {
    stage: Stage::Gamma,
    axes: &[Axis::TargetStyle],
    fallback_chars: 300,
    mock_response: r#"{"headline_options": {"news_type": "模擬新聞標題", "data_type": "模擬數據標題"}, "recommended": "模擬新聞標題", "seo_keywords": ["模擬"]}"#,
    parse: parse_gamma,
    fallback: fallback_gamma,
};

static DELTA_SPEC: StageSpec = StageSpec {
    stage: Stage::Delta,
    axes: &[Axis::Tone],
    fallback_chars: 1200,
    mock_response: r#"{"final_content": "最終模擬內容", "selected_headline": "最終模擬標題", "quality_report": {"issues_found": [], "corrections_made": []}, "publish_ready": true}"#,
    parse: parse_delta,
    fallback: fallback_delta,
};

fn parse_alpha(map: &Map<String, Value>) -> StageRecord {
    StageRecord::Alpha(AlphaRecord::from_map(map))
}

fn fallback_alpha(raw: &str) -> StageRecord {
    StageRecord::Alpha(AlphaRecord::fallback(raw, ALPHA_SPEC.fallback_chars))
}

fn parse_beta(map: &Map<String, Value>) -> StageRecord {
    StageRecord::Beta(BetaRecord::from_map(map))
}

fn fallback_beta(raw: &str) -> StageRecord {
    StageRecord::Beta(BetaRecord::fallback(raw, BETA_SPEC.fallback_chars))
}

fn parse_gamma(map: &Map<String, Value>) -> StageRecord {
    StageRecord::Gamma(GammaRecord::from_map(map))
}

fn fallback_gamma(raw: &str) -> StageRecord {
    StageRecord::Gamma(GammaRecord::fallback(raw, GAMMA_SPEC.fallback_chars))
}

fn parse_delta(map: &Map<String, Value>) -> StageRecord {
    StageRecord::Delta(DeltaRecord::from_map(map))
}

fn fallback_delta(raw: &str) -> StageRecord {
    StageRecord::Delta(DeltaRecord::fallback(raw, DELTA_SPEC.fallback_chars))
}
