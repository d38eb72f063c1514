use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::TemplateError;

/// A categorical axis selecting additive prompt fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    NewsType,
    TargetStyle,
    Tone,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::NewsType, Axis::TargetStyle, Axis::Tone];

    /// Config field / parameter name
    pub fn key(self) -> &'static str {
        match self {
            Axis::NewsType => "news_type",
            Axis::TargetStyle => "target_style",
            Axis::Tone => "tone",
        }
    }

    /// Template section holding this axis' fragments
    pub fn section(self) -> &'static str {
        match self {
            Axis::NewsType => "by_news_type",
            Axis::TargetStyle => "by_target_style",
            Axis::Tone => "by_tone",
        }
    }

    /// Human-facing name used in menus
    pub fn title(self) -> &'static str {
        match self {
            Axis::NewsType => "news category",
            Axis::TargetStyle => "target outlet style",
            Axis::Tone => "tone",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Chosen label per categorical axis; `None` means "not selected"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections {
    pub news_type: Option<String>,
    pub target_style: Option<String>,
    pub tone: Option<String>,
}

impl Selections {
    pub fn get(&self, axis: Axis) -> Option<&str> {
        match axis {
            Axis::NewsType => self.news_type.as_deref(),
            Axis::TargetStyle => self.target_style.as_deref(),
            Axis::Tone => self.tone.as_deref(),
        }
    }

    pub fn set(&mut self, axis: Axis, value: Option<String>) {
        match axis {
            Axis::NewsType => self.news_type = value,
            Axis::TargetStyle => self.target_style = value,
            Axis::Tone => self.tone = value,
        }
    }

    /// Keep only the axes listed
    pub fn restricted_to(&self, axes: &[Axis]) -> Self {
        let mut out = Self::default();
        for &axis in axes {
            out.set(axis, self.get(axis).map(str::to_string));
        }
        out
    }
}

/// Base system/user prompt of a stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasePrompt {
    pub system: String,
    pub user: String,
}

/// Fragment appended to the user prompt for one category label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFragment {
    pub user_append: String,
}

/// A stage's merged prompt templates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplateSet {
    pub base: BasePrompt,
    pub by_news_type: IndexMap<String, CategoryFragment>,
    pub by_target_style: IndexMap<String, CategoryFragment>,
    pub by_tone: IndexMap<String, CategoryFragment>,
}

impl PromptTemplateSet {
    pub fn fragments(&self, axis: Axis) -> &IndexMap<String, CategoryFragment> {
        match axis {
            Axis::NewsType => &self.by_news_type,
            Axis::TargetStyle => &self.by_target_style,
            Axis::Tone => &self.by_tone,
        }
    }

    /// Non-empty fragment for `label` on `axis`
    pub fn fragment(&self, axis: Axis, label: &str) -> Option<&str> {
        self.fragments(axis)
            .get(label)
            .map(|f| f.user_append.as_str())
            .filter(|text| !text.is_empty())
    }

    /// Known labels on `axis`, in template order
    pub fn labels(&self, axis: Axis) -> Vec<String> {
        self.fragments(axis).keys().cloned().collect()
    }
}

/// Empty four-section template used when a stage has no template file
pub fn skeleton() -> Value {
    json!({"base": {}, "by_news_type": {}, "by_target_style": {}, "by_tone": {}})
}

/// Right-biased recursive merge: nested objects merge key-wise, every other
/// override value replaces the base value outright
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Reject override data that would not merge into a usable template set
pub fn validate_override(data: &Value) -> Result<(), TemplateError> {
    let sections = data
        .as_object()
        .ok_or_else(|| invalid(format!("override must be a JSON object, got {}", type_name(data))))?;

    for (section, value) in sections {
        match section.as_str() {
            "base" => {
                let base = value
                    .as_object()
                    .ok_or_else(|| invalid(format!("'base' must be an object, got {}", type_name(value))))?;
                for (key, text) in base {
                    if matches!(key.as_str(), "system" | "user") && !text.is_string() {
                        return Err(invalid(format!(
                            "'base.{}' must be a string, got {}",
                            key,
                            type_name(text)
                        )));
                    }
                }
            }
            "by_news_type" | "by_target_style" | "by_tone" => {
                let labels = value.as_object().ok_or_else(|| {
                    invalid(format!("'{}' must be an object, got {}", section, type_name(value)))
                })?;
                for (label, fragment) in labels {
                    let fragment = fragment.as_object().ok_or_else(|| {
                        invalid(format!(
                            "'{}.{}' must be an object, got {}",
                            section,
                            label,
                            type_name(fragment)
                        ))
                    })?;
                    if let Some(text) = fragment.get("user_append") {
                        if !text.is_string() {
                            return Err(invalid(format!(
                                "'{}.{}.user_append' must be a string, got {}",
                                section,
                                label,
                                type_name(text)
                            )));
                        }
                    }
                }
            }
            other => {
                return Err(invalid(format!(
                    "unknown section '{}' (expected base, by_news_type, by_target_style or by_tone)",
                    other
                )));
            }
        }
    }

    Ok(())
}

fn invalid(message: String) -> TemplateError {
    TemplateError::InvalidOverride(message)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
