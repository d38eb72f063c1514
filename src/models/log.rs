use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Append-only checkpoint record emitted by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Stage label ("Alpha", ...) or "Initial" for run setup entries
    pub stage: String,
    /// Checkpoint name ("raw_output", "user_choice", ...)
    pub action: String,
    pub details: Value,
}

impl LogEntry {
    pub fn new(stage: impl Into<String>, action: impl Into<String>, details: Value) -> Self {
        Self {
            stage: stage.into(),
            action: action.into(),
            details,
        }
    }
}

/// Destination for pipeline checkpoints
///
/// Implementations must accept writes from concurrent runs; each call
/// appends exactly one entry.
pub trait LogSink: Send + Sync {
    fn log(&self, entry: LogEntry);
}

/// Discards every entry
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl LogSink for NullLog {
    fn log(&self, _entry: LogEntry) {}
}

/// Collects entries in memory, in emission order
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Entries for one stage label with the given action
    pub fn find(&self, stage: &str, action: &str) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.stage == stage && e.action == action)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LogSink for MemoryLog {
    fn log(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_log_keeps_order() {
        let log = MemoryLog::new();
        log.log(LogEntry::new("Alpha", "raw_output", json!({})));
        log.log(LogEntry::new("Alpha", "user_choice", json!({"choice": "accept"})));
        log.log(LogEntry::new("Beta", "user_choice", json!({"choice": "retry"})));

        assert_eq!(log.len(), 3);
        assert_eq!(log.entries()[1].action, "user_choice");
        assert_eq!(log.find("Alpha", "user_choice").len(), 1);
    }
}
