use serde_json::Value;

use crate::models::{AlphaRecord, GammaRecord, PipelineConfig};
use crate::prompts::PromptContext;

/// Shown in place of absent free-text constraints
pub const NO_CONSTRAINTS: &str = "無";

/// Every config field as text
pub fn alpha_context(config: &PipelineConfig) -> PromptContext {
    let constraints = config
        .constraints
        .as_deref()
        .filter(|text| !text.is_empty())
        .unwrap_or(NO_CONSTRAINTS);
    let additional_answers = config
        .additional_answers
        .as_ref()
        .map(|answers| Value::Object(answers.clone()).to_string())
        .unwrap_or_default();

    let mut context = PromptContext::new();
    context.insert("raw_data".to_string(), config.raw_data.clone());
    context.insert("news_type".to_string(), config.news_type.clone());
    context.insert("target_style".to_string(), config.target_style.clone());
    context.insert("word_limit".to_string(), config.word_limit.to_string());
    context.insert("constraints".to_string(), constraints.to_string());
    context.insert("tone".to_string(), config.tone.clone());
    context.insert("additional_answers".to_string(), additional_answers);
    context.insert("additional_block".to_string(), String::new());
    context
}

pub fn beta_context(config: &PipelineConfig, alpha: &AlphaRecord) -> PromptContext {
    let mut context = alpha_context(config);
    context.insert("draft_content".to_string(), alpha.draft_content.clone());
    context
}

pub fn gamma_context(config: &PipelineConfig, alpha: &AlphaRecord, styled_content: &str) -> PromptContext {
    let mut context = alpha_context(config);
    context.insert("styled_content".to_string(), styled_content.to_string());
    context.insert(
        "primary_info".to_string(),
        alpha.key_points.first().cloned().unwrap_or_default(),
    );
    context
}

pub fn delta_context(styled_content: &str, gamma: &GammaRecord, selected_headline: &str) -> PromptContext {
    let mut context = PromptContext::new();
    context.insert("final_content".to_string(), styled_content.to_string());
    context.insert(
        "headline_options".to_string(),
        serde_json::to_string(&gamma.headline_options).unwrap_or_default(),
    );
    context.insert("recommended_headline".to_string(), selected_headline.to_string());
    context
}

/// Session-level directive carrying the operator's Delta revision notes
pub fn revision_directive(notes: &str) -> String {
    let notes = notes.trim();
    if notes.is_empty() {
        return String::new();
    }
    format!(
        "\n[Revision instructions]\n{}\nRevise and polish the final draft according to the instructions above without altering any facts.",
        notes
    )
}
