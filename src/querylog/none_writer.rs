use super::types::{LogEntry, QueryLogWriter};

/// Discards everything; used when query logging is disabled.
#[derive(Debug, Default)]
pub struct NoneWriter;

#[async_trait::async_trait]
impl QueryLogWriter for NoneWriter {
    async fn write(&mut self, _entry: &LogEntry) {}

    async fn clean_up(&mut self) {}
}
