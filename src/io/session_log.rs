use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{LogEntry, Stage};
use crate::pipeline::PipelineResponse;

pub const CSV_COLUMNS: [&str; 11] = [
    "session_id",
    "start_time",
    "end_time",
    "duration_seconds",
    "initial_raw_data",
    "alpha_decisions",
    "beta_decisions",
    "gamma_decisions",
    "delta_decisions",
    "final_headline",
    "final_body",
];

pub const DEFAULT_LOG_CSV: &str = "pipeline_log.csv";

/// Stage label of run setup entries
pub const INITIAL_STAGE: &str = "Initial";

const CSV_TEXT_CHARS: usize = 250;

/// `session_<YYYYmmdd_HHMMSS>_<8 hex>`
pub fn new_session_id(now: DateTime<Local>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// Everything recorded about one finished (or failed) run
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub raw_data: String,
    pub entries: Vec<LogEntry>,
    pub response: PipelineResponse,
}

impl SessionRecord {
    pub fn duration_seconds(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// `{action, details}` list for one stage label
    fn decisions(&self, stage: Stage) -> String {
        let items: Vec<Value> = self
            .entries
            .iter()
            .filter(|e| e.stage == stage.label())
            .map(|e| json!({"action": e.action, "details": e.details}))
            .collect();
        Value::Array(items).to_string()
    }

    /// Cells in `CSV_COLUMNS` order
    pub fn csv_fields(&self) -> Vec<String> {
        let (headline, body) = match &self.response.data {
            Some(data) if self.response.success => {
                (data.best_title.clone(), truncate_for_csv(&data.final_body))
            }
            _ => (
                String::new(),
                format!(
                    "[FAILED] stage={} message={}",
                    self.response.stage.as_deref().unwrap_or("none"),
                    self.response.message.as_deref().unwrap_or("")
                ),
            ),
        };

        vec![
            self.session_id.clone(),
            timestamp(&self.start_time),
            timestamp(&self.end_time),
            format!("{:.2}", self.duration_seconds()),
            truncate_for_csv(&self.raw_data),
            self.decisions(Stage::Alpha),
            self.decisions(Stage::Beta),
            self.decisions(Stage::Gamma),
            self.decisions(Stage::Delta),
            headline,
            body,
        ]
    }

    pub fn detail_json(&self) -> Value {
        json!({
            "session_id": self.session_id,
            "start_time": timestamp(&self.start_time),
            "end_time": timestamp(&self.end_time),
            "result": self.response,
            "log_entries": self.entries,
        })
    }
}

/// Appends session records to a CSV file, one writer at a time
#[derive(Debug)]
pub struct SessionLog {
    csv_path: PathBuf,
    json_dir: Option<PathBuf>,
    lock: Mutex<()>,
}

impl SessionLog {
    pub fn new(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            json_dir: None,
            lock: Mutex::new(()),
        }
    }

    pub fn with_json_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.json_dir = Some(dir.into());
        self
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Append the CSV row; a failed JSON detail write is only warned about
    pub fn write(&self, record: &SessionRecord) -> Result<()> {
        let _guard = self.lock.lock();

        if let Some(dir) = &self.json_dir {
            if let Err(e) = write_detail(dir, record) {
                warn!("Failed to write session detail for {}: {:#}", record.session_id, e);
            }
        }

        let needs_header = !self.csv_path.exists();
        if let Some(parent) = self.csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Failed to open session log: {:?}", self.csv_path))?;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);
        if needs_header {
            writer
                .write_record(CSV_COLUMNS)
                .context("Failed to write session log header")?;
        }
        writer
            .write_record(record.csv_fields())
            .with_context(|| format!("Failed to write session log: {:?}", self.csv_path))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush session log: {:?}", self.csv_path))?;

        debug!("Session {} written to {:?}", record.session_id, self.csv_path);
        Ok(())
    }
}

fn write_detail(dir: &Path, record: &SessionRecord) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {:?}", dir))?;
    let path = dir.join(format!("{}.json", record.session_id));
    let file =
        fs::File::create(&path).with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, &record.detail_json()).context("Failed to write JSON")?;
    Ok(())
}

fn timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// First 250 characters with `...` when cut; newlines escaped as `\n`
pub fn truncate_for_csv(text: &str) -> String {
    let mut out: String = text.chars().take(CSV_TEXT_CHARS).collect();
    if text.chars().count() > CSV_TEXT_CHARS {
        out.push_str("...");
    }
    out.replace('\n', "\\n")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FinalRecord;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(response: PipelineResponse) -> SessionRecord {
        let start = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        SessionRecord {
            session_id: "session_20240501_093000_abcd1234".to_string(),
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(2500),
            raw_data: "line one\nline two".to_string(),
            entries: vec![
                LogEntry::new(INITIAL_STAGE, "config", json!({})),
                LogEntry::new("Alpha", "user_choice", json!({"choice": "accept", "attempt": 1})),
            ],
            response,
        }
    }

    fn completed() -> PipelineResponse {
        PipelineResponse {
            success: true,
            stage: None,
            message: None,
            data: Some(FinalRecord {
                final_body: "body, with comma".to_string(),
                best_title: "Title".to_string(),
                ..FinalRecord::default()
            }),
        }
    }

    #[test]
    fn test_session_id_format() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let id = new_session_id(now);
        assert!(id.starts_with("session_20240501_093000_"));
        let suffix = &id["session_20240501_093000_".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_truncate_for_csv() {
        assert_eq!(truncate_for_csv("a\nb"), "a\\nb");
        let long = "字".repeat(300);
        let cut = truncate_for_csv(&long);
        assert_eq!(cut.chars().count(), 253);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_rows_read_back_with_quoted_json() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::new(dir.path().join("run.csv"));
        let mut quoted = record(completed());
        quoted.raw_data = "He said \"hi\", then left".to_string();
        log.write(&quoted).unwrap();

        let mut reader = csv::Reader::from_path(log.csv_path()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_COLUMNS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][4], "He said \"hi\", then left");
        let decisions: Value = serde_json::from_str(&rows[0][5]).unwrap();
        assert_eq!(decisions[0]["details"]["choice"], "accept");
        assert_eq!(&rows[0][10], "body, with comma");
    }

    #[test]
    fn test_completed_row() {
        let fields = record(completed()).csv_fields();
        assert_eq!(fields.len(), CSV_COLUMNS.len());
        assert_eq!(fields[2], "2024-05-01T09:30:02.500000");
        assert_eq!(fields[3], "2.50");
        assert_eq!(fields[4], "line one\\nline two");
        assert_eq!(
            fields[5],
            r#"[{"action":"user_choice","details":{"choice":"accept","attempt":1}}]"#
        );
        assert_eq!(fields[6], "[]");
        assert_eq!(fields[9], "Title");
        assert_eq!(fields[10], "body, with comma");
    }

    #[test]
    fn test_failed_row() {
        let response = PipelineResponse {
            success: false,
            stage: Some("beta".to_string()),
            message: Some("operator cancelled".to_string()),
            data: None,
        };
        let fields = record(response).csv_fields();
        assert_eq!(fields[9], "");
        assert_eq!(fields[10], "[FAILED] stage=beta message=operator cancelled");
    }

    #[test]
    fn test_write_appends_with_single_header() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::new(dir.path().join("logs").join("run.csv"))
            .with_json_dir(dir.path().join("details"));

        let first = record(completed());
        log.write(&first).unwrap();
        log.write(&first).unwrap();

        let text = fs::read_to_string(log.csv_path()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("session_id,start_time,end_time"));
        assert!(lines[1].ends_with("Title,\"body, with comma\""));

        let detail_path = dir
            .path()
            .join("details")
            .join("session_20240501_093000_abcd1234.json");
        let detail: Value = serde_json::from_str(&fs::read_to_string(detail_path).unwrap()).unwrap();
        assert_eq!(detail["result"]["data"]["best_title"], "Title");
        assert_eq!(detail["log_entries"].as_array().unwrap().len(), 2);
    }
}
