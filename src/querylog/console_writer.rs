use super::types::{LogEntry, QueryLogWriter};
use tracing::info;

/// Writes each entry as one structured line to the process log.
#[derive(Debug, Default)]
pub struct ConsoleWriter;

impl ConsoleWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl QueryLogWriter for ConsoleWriter {
    async fn write(&mut self, entry: &LogEntry) {
        info!(
            target: "querylog",
            client_ip = %entry.client_ip,
            client_names = %entry.client_names_string(),
            question_type = %entry.question.record_type,
            question_name = %entry.question.value,
            answer = %entry.answers_string(),
            response_reason = %entry.response_reason,
            response_type = %entry.response_type,
            response_code = %entry.response_code,
            duration_ms = entry.duration_ms,
            "query resolved"
        );
    }

    async fn clean_up(&mut self) {}
}
