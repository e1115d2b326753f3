use chrono::{Local, NaiveDate};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_PREFIX_LEN: usize = 10;

/// Deletes `YYYY-MM-DD*.log` files older than the retention window.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    dir: PathBuf,
    retention_days: u64,
}

impl RetentionSweeper {
    pub fn new(dir: impl Into<PathBuf>, retention_days: u64) -> Self {
        Self {
            dir: dir.into(),
            retention_days,
        }
    }

    /// Sweeps relative to the local calendar date.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Local::now().date_naive())
    }

    /// Runs [`sweep`](Self::sweep) on the blocking pool so directory scans
    /// never hold up a runtime worker.
    pub async fn sweep_blocking(&self) -> usize {
        let sweeper = self.clone();
        match tokio::task::spawn_blocking(move || sweeper.sweep()).await {
            Ok(deleted) => deleted,
            Err(e) => {
                error!("Query log retention sweep aborted: {}", e);
                0
            }
        }
    }

    /// Deletes files dated strictly more than `retention_days` before `today`.
    /// Returns the number of files removed.
    pub fn sweep_at(&self, today: NaiveDate) -> usize {
        if self.retention_days == 0 {
            return 0;
        }

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to read log directory {}: {}", self.dir.display(), e);
                return 0;
            }
        };

        // Anything beyond i64 days keeps every file.
        let retention = i64::try_from(self.retention_days).unwrap_or(i64::MAX);
        let mut deleted = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(date) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(log_file_date)
            else {
                continue;
            };

            let age_days = (today - date).num_days();
            if age_days > retention {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        info!("Deleted expired query log {}", path.display());
                        deleted += 1;
                    }
                    Err(e) => error!("Failed to delete {}: {}", path.display(), e),
                }
            }
        }

        debug!(
            dir = %self.dir.display(),
            retention_days = self.retention_days,
            deleted,
            "Query log retention sweep done"
        );
        deleted
    }
}

/// Date stamp of a `YYYY-MM-DD*.log` file name.
fn log_file_date(name: &str) -> Option<NaiveDate> {
    if !name.ends_with(".log") {
        return None;
    }
    let prefix = name.get(..DATE_PREFIX_LEN)?;
    NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok()
}
