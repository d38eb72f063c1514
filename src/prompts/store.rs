use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TemplateError;
use crate::llm::from_relaxed_str;
use crate::models::Stage;
use crate::prompts::template::skeleton;

/// Persistent storage for per-stage prompt templates and their overrides
pub trait TemplateStore: Send + Sync {
    /// Base template set; a missing template yields the empty skeleton
    fn load(&self, stage: Stage) -> Result<Value, TemplateError>;

    /// Override layer; an empty object when none is stored
    fn load_override(&self, stage: Stage) -> Result<Value, TemplateError>;

    fn save_override(&self, stage: Stage, data: &Value) -> Result<(), TemplateError>;

    fn remove_override(&self, stage: Stage) -> Result<(), TemplateError>;
}

/// Templates stored as `<dir>/<stage>.json` with overrides under `<dir>/overrides/`
#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn base_path(&self, stage: Stage) -> PathBuf {
        self.dir.join(format!("{}.json", stage.name()))
    }

    pub fn override_path(&self, stage: Stage) -> PathBuf {
        self.dir.join("overrides").join(format!("{}.json", stage.name()))
    }

    fn read_optional(&self, path: &Path) -> Result<Option<Value>, TemplateError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_template_text(path, &text).map(Some)
    }
}

impl TemplateStore for FileTemplateStore {
    fn load(&self, stage: Stage) -> Result<Value, TemplateError> {
        let path = self.base_path(stage);
        match self.read_optional(&path)? {
            Some(value) => Ok(value),
            None => {
                debug!("No template at {:?}, using empty skeleton", path);
                Ok(skeleton())
            }
        }
    }

    fn load_override(&self, stage: Stage) -> Result<Value, TemplateError> {
        Ok(self
            .read_optional(&self.override_path(stage))?
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    fn save_override(&self, stage: Stage, data: &Value) -> Result<(), TemplateError> {
        let path = self.override_path(stage);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TemplateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(data).map_err(|e| TemplateError::Malformed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, text).map_err(|source| TemplateError::Io { path, source })
    }

    fn remove_override(&self, stage: Stage) -> Result<(), TemplateError> {
        let path = self.override_path(stage);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|source| TemplateError::Io { path, source })
    }
}

/// Strict JSON first, then relaxed JSON; the top level must be an object
fn parse_template_text(path: &Path, text: &str) -> Result<Value, TemplateError> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(strict) => from_relaxed_str(text).map_err(|_| TemplateError::Malformed {
            path: path.to_path_buf(),
            message: strict.to_string(),
        })?,
    };
    if !value.is_object() {
        return Err(TemplateError::Malformed {
            path: path.to_path_buf(),
            message: "top-level value must be an object".to_string(),
        });
    }
    Ok(value)
}

/// In-memory template store
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    base: RwLock<HashMap<Stage, Value>>,
    overrides: RwLock<HashMap<Stage, Value>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(self, stage: Stage, template: Value) -> Self {
        self.base.write().insert(stage, template);
        self
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn load(&self, stage: Stage) -> Result<Value, TemplateError> {
        Ok(self.base.read().get(&stage).cloned().unwrap_or_else(skeleton))
    }

    fn load_override(&self, stage: Stage) -> Result<Value, TemplateError> {
        Ok(self
            .overrides
            .read()
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    fn save_override(&self, stage: Stage, data: &Value) -> Result<(), TemplateError> {
        self.overrides.write().insert(stage, data.clone());
        Ok(())
    }

    fn remove_override(&self, stage: Stage) -> Result<(), TemplateError> {
        self.overrides.write().remove(&stage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_template_is_skeleton() {
        let dir = TempDir::new().unwrap();
        let store = FileTemplateStore::new(dir.path());

        assert_eq!(store.load(Stage::Gamma).unwrap(), skeleton());
        assert_eq!(store.load_override(Stage::Gamma).unwrap(), json!({}));
    }

    #[test]
    fn test_relaxed_template_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("alpha.json"),
            "{\n  // base prompt\n  base: {system: 'S', user: 'U',},\n}",
        )
        .unwrap();
        let store = FileTemplateStore::new(dir.path());

        let loaded = store.load(Stage::Alpha).unwrap();
        assert_eq!(loaded["base"]["system"], "S");
        assert_eq!(loaded["base"]["user"], "U");
    }

    #[test]
    fn test_malformed_template_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("beta.json"), "not a template").unwrap();
        let store = FileTemplateStore::new(dir.path());

        let err = store.load(Stage::Beta).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { .. }));
    }

    #[test]
    fn test_override_round_trip_leaves_base_untouched() {
        let dir = TempDir::new().unwrap();
        let base = r#"{"base": {"system": "S", "user": "U"}}"#;
        fs::write(dir.path().join("delta.json"), base).unwrap();
        let store = FileTemplateStore::new(dir.path());

        let data = json!({"base": {"user": "override"}});
        store.save_override(Stage::Delta, &data).unwrap();
        assert!(store.override_path(Stage::Delta).exists());
        assert_eq!(store.load_override(Stage::Delta).unwrap(), data);

        store.remove_override(Stage::Delta).unwrap();
        assert_eq!(store.load_override(Stage::Delta).unwrap(), json!({}));
        // Removing twice is fine
        store.remove_override(Stage::Delta).unwrap();

        let on_disk = fs::read_to_string(dir.path().join("delta.json")).unwrap();
        assert_eq!(on_disk, base);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTemplateStore::new()
            .with_base(Stage::Alpha, json!({"base": {"user": "hello"}}));

        assert_eq!(store.load(Stage::Alpha).unwrap()["base"]["user"], "hello");
        assert_eq!(store.load(Stage::Beta).unwrap(), skeleton());

        store.save_override(Stage::Alpha, &json!({"by_tone": {}})).unwrap();
        assert_eq!(store.load_override(Stage::Alpha).unwrap(), json!({"by_tone": {}}));
        store.remove_override(Stage::Alpha).unwrap();
        assert_eq!(store.load_override(Stage::Alpha).unwrap(), json!({}));
    }
}
