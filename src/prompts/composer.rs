use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::TemplateError;
use crate::models::{Stage, truncate_chars};
use crate::prompts::store::TemplateStore;
use crate::prompts::summaries;
use crate::prompts::template::{Axis, PromptTemplateSet, Selections, deep_merge, validate_override};

/// Placeholder values for one stage, in insertion order
pub type PromptContext = IndexMap<String, String>;

const DESIGN_BASIS_HEADER: &str = "\n\n# Design basis\n";

/// Final system and user prompt strings for one model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub system: String,
    pub user: String,
}

impl ComposedPrompt {
    /// Diagnostic rendering of both prompts
    pub fn preview(&self) -> String {
        format!("[SYSTEM]\n{}\n\n[USER]\n{}", self.system, self.user)
            .trim()
            .to_string()
    }

    /// Preview cut to `limit` characters, marked when truncated
    pub fn preview_truncated(&self, limit: usize) -> String {
        let preview = self.preview();
        if preview.chars().count() > limit {
            format!("{}\n...", truncate_chars(&preview, limit))
        } else {
            preview
        }
    }
}

/// Builds stage prompts from a template store, caching merged template sets
pub struct PromptComposer {
    store: Arc<dyn TemplateStore>,
    cache: RwLock<HashMap<Stage, Arc<PromptTemplateSet>>>,
}

impl PromptComposer {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Base templates with the override layer deep-merged on top
    pub fn load_stage(&self, stage: Stage) -> Result<Arc<PromptTemplateSet>, TemplateError> {
        if let Some(cached) = self.cache.read().get(&stage) {
            return Ok(Arc::clone(cached));
        }

        let base = self.store.load(stage)?;
        let overlay = self.store.load_override(stage)?;
        let merged = deep_merge(&base, &overlay);
        let set: PromptTemplateSet =
            serde_json::from_value(merged).map_err(|e| TemplateError::Malformed {
                path: PathBuf::from(format!("{}.json", stage.name())),
                message: e.to_string(),
            })?;

        let set = Arc::new(set);
        self.cache.write().insert(stage, Arc::clone(&set));
        debug!("Loaded prompt templates for {}", stage);
        Ok(set)
    }

    /// Base text, then each selected label's fragment, a design-basis note
    /// attributing them and the session append; placeholders filled last
    pub fn compose(
        &self,
        stage: Stage,
        context: &PromptContext,
        selections: &Selections,
        session_append: &str,
    ) -> Result<ComposedPrompt, TemplateError> {
        let templates = self.load_stage(stage)?;
        let mut user = templates.base.user.clone();

        let mut notes = Vec::new();
        for axis in Axis::ALL {
            let Some(label) = selections.get(axis).filter(|label| !label.is_empty()) else {
                continue;
            };
            if let Some(fragment) = templates.fragment(axis, label) {
                user.push('\n');
                user.push_str(fragment);
                notes.push(format!("[source: {}={}] {}", axis.key(), label, fragment));
            }
        }
        if !notes.is_empty() {
            user.push_str(DESIGN_BASIS_HEADER);
            user.push_str(&notes.join("\n"));
        }
        if !session_append.is_empty() {
            user.push('\n');
            user.push_str(session_append);
        }

        Ok(ComposedPrompt {
            system: substitute(&templates.base.system, context),
            user: substitute(&user, context),
        })
    }

    /// Compose and render without touching any pipeline state
    pub fn preview(
        &self,
        stage: Stage,
        context: &PromptContext,
        selections: &Selections,
        session_append: &str,
    ) -> Result<String, TemplateError> {
        Ok(self
            .compose(stage, context, selections, session_append)?
            .preview())
    }

    /// Validate and store an override, then drop the cached merge
    pub fn save_override(&self, stage: Stage, data: &serde_json::Value) -> Result<(), TemplateError> {
        validate_override(data)?;
        self.store.save_override(stage, data)?;
        self.cache.write().remove(&stage);
        Ok(())
    }

    pub fn remove_override(&self, stage: Stage) -> Result<(), TemplateError> {
        self.store.remove_override(stage)?;
        self.cache.write().remove(&stage);
        Ok(())
    }

    /// Labels offered for re-selection on `axis`.
    ///
    /// Taken from the Alpha templates, which carry every axis; the built-in
    /// labels are used when those templates list none.
    pub fn category_options(&self, axis: Axis) -> Result<Vec<String>, TemplateError> {
        let labels = self.load_stage(Stage::Alpha)?.labels(axis);
        if !labels.is_empty() {
            return Ok(labels);
        }
        Ok(summaries::default_options(axis)
            .iter()
            .map(|(label, _)| label.to_string())
            .collect())
    }

    pub fn preview_for_choice(&self, selections: &Selections) -> Vec<String> {
        summaries::preview_for_choice(selections)
    }
}

/// Replace `{key}` for every key in `context` in one left-to-right pass.
///
/// Substituted values are never rescanned, and unknown placeholders are
/// copied verbatim.
pub fn substitute(template: &str, context: &PromptContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after
            .find('}')
            .and_then(|close| context.get(&after[..close]).map(|value| (close, value)));

        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
