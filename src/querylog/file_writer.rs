use super::error::{WriterError, WriterResult};
use super::retention::RetentionSweeper;
use super::sanitize::sanitize_file_name;
use super::types::{LogEntry, QueryLogWriter};
use chrono::NaiveDate;
use std::collections::hash_map::{Entry, HashMap};
use std::io;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const DELIMITER: char = '\t';

/// Appends tab separated rows to one file per day, optionally split per client.
///
/// File names are `YYYY-MM-DD_ALL.log`, or `YYYY-MM-DD_<client>.log` when
/// `per_client` is set. All file system access goes through `tokio::fs`, so
/// a stalled disk only stalls the writer task.
pub struct CsvFileWriter {
    target: PathBuf,
    per_client: bool,
    sweeper: RetentionSweeper,
    current_day: Option<NaiveDate>,
    handles: HashMap<PathBuf, File>,
}

impl CsvFileWriter {
    pub async fn new(target: &str, per_client: bool, retention_days: u64) -> WriterResult<Self> {
        if target.trim().is_empty() {
            return Err(WriterError::InvalidTarget(target.to_string()));
        }

        let dir = PathBuf::from(target);
        fs::create_dir_all(&dir).await?;
        if !fs::metadata(&dir).await?.is_dir() {
            return Err(WriterError::InvalidTarget(target.to_string()));
        }

        info!(
            "Query log writes csv files to {} (per client: {})",
            dir.display(),
            per_client
        );

        Ok(Self {
            sweeper: RetentionSweeper::new(&dir, retention_days),
            target: dir,
            per_client,
            current_day: None,
            handles: HashMap::new(),
        })
    }

    fn file_path(&self, entry: &LogEntry) -> PathBuf {
        let date = entry.timestamp.format(DATE_FORMAT);
        let suffix = if self.per_client {
            let client = if entry.client_names.is_empty() {
                entry.client_ip.clone()
            } else {
                entry.client_names.join("-")
            };
            sanitize_file_name(&client)
        } else {
            "ALL".to_string()
        };
        self.target.join(format!("{}_{}.log", date, suffix))
    }

    async fn append(&mut self, path: PathBuf, row: &str) -> io::Result<()> {
        let file = match self.handles.entry(path) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(e.key())
                    .await?;
                e.insert(file)
            }
        };
        file.write_all(row.as_bytes()).await?;
        // tokio hands the write to the blocking pool; wait until it landed.
        file.flush().await
    }
}

fn needs_quotes(field: &str) -> bool {
    if field.is_empty() {
        return false;
    }
    if field == r"\." {
        return true;
    }
    if field.contains(|c: char| c == DELIMITER || c == '"' || c == '\r' || c == '\n') {
        return true;
    }
    field.starts_with(char::is_whitespace)
}

fn push_field(row: &mut String, field: &str) {
    if !needs_quotes(field) {
        row.push_str(field);
        return;
    }
    row.push('"');
    for c in field.chars() {
        if c == '"' {
            row.push_str("\"\"");
        } else {
            row.push(c);
        }
    }
    row.push('"');
}

/// One log row: timestamp, client ip, client names, duration, reason,
/// question, answers.
///
/// Fields are tab separated and quoted like RFC 4180 CSV: a field holding a
/// quote, tab or line break (or starting with a space) is wrapped in `"`
/// with inner quotes doubled. The row ends with `\n`.
pub fn format_row(entry: &LogEntry) -> String {
    let fields = [
        entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        entry.client_ip.clone(),
        entry.client_names_string(),
        entry.duration_ms.to_string(),
        entry.response_reason.clone(),
        entry.question.to_string(),
        entry.answers_string(),
    ];

    let mut row = String::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            row.push(DELIMITER);
        }
        push_field(&mut row, field);
    }
    row.push('\n');
    row
}

#[async_trait::async_trait]
impl QueryLogWriter for CsvFileWriter {
    async fn write(&mut self, entry: &LogEntry) {
        let day = entry.timestamp.date_naive();
        if self.current_day != Some(day) {
            // New day, new files.
            self.handles.clear();
            self.current_day = Some(day);
        }

        let path = self.file_path(entry);
        let row = format_row(entry);
        if let Err(e) = self.append(path.clone(), &row).await {
            error!("Failed to write query log to {}: {}", path.display(), e);
            self.handles.remove(&path);
        }
    }

    async fn clean_up(&mut self) {
        self.sweeper.sweep_blocking().await;
    }
}
