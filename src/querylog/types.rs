use crate::resolver::{Request, Response, ResponseType};
use chrono::{DateTime, Local};
use hickory_server::proto::op::{Message, ResponseCode};
use std::fmt;

/// A `(record type, value)` pair as it appears in the log, e.g. `A (example.com.)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordSummary {
    pub record_type: String,
    pub value: String,
}

impl RecordSummary {
    pub fn new(record_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for RecordSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.record_type, self.value)
    }
}

/// One resolved query. Built once by the logging link and consumed once by a writer.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub client_ip: String,
    pub client_names: Vec<String>,
    pub duration_ms: u64,
    pub response_reason: String,
    pub question: RecordSummary,
    pub answers: Vec<RecordSummary>,
    pub response_type: ResponseType,
    pub response_code: String,
}

impl LogEntry {
    /// Entry for a request the chain answered.
    pub fn from_response(request: &Request, response: &Response, duration_ms: u64) -> Self {
        Self {
            timestamp: Local::now(),
            client_ip: request.client_ip.to_string(),
            client_names: request.client_names.clone(),
            duration_ms,
            response_reason: response.reason.clone(),
            question: question_of(&request.message),
            answers: answers_of(&response.message),
            response_type: response.response_type,
            response_code: rcode_str(response.message.response_code()),
        }
    }

    /// Entry for a request the next link failed on; keeps what the request tells us.
    pub fn from_error(request: &Request, error: &anyhow::Error, duration_ms: u64) -> Self {
        Self {
            timestamp: Local::now(),
            client_ip: request.client_ip.to_string(),
            client_names: request.client_names.clone(),
            duration_ms,
            response_reason: format!("error: {}", error),
            question: question_of(&request.message),
            answers: Vec::new(),
            response_type: ResponseType::Failed,
            response_code: rcode_str(ResponseCode::ServFail),
        }
    }

    /// Answers rendered as `TYPE (value), TYPE (value)`; empty without answers.
    pub fn answers_string(&self) -> String {
        self.answers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn client_names_string(&self) -> String {
        self.client_names.join("; ")
    }
}

fn question_of(message: &Message) -> RecordSummary {
    message
        .queries()
        .first()
        .map(|q| RecordSummary::new(q.query_type().to_string(), q.name().to_string()))
        .unwrap_or_default()
}

fn answers_of(message: &Message) -> Vec<RecordSummary> {
    message
        .answers()
        .iter()
        .map(|r| RecordSummary::new(r.record_type().to_string(), r.data().to_string()))
        .collect()
}

pub(crate) fn rcode_str(code: ResponseCode) -> String {
    match u16::from(code) {
        0 => "NOERROR".to_string(),
        1 => "FORMERR".to_string(),
        2 => "SERVFAIL".to_string(),
        3 => "NXDOMAIN".to_string(),
        4 => "NOTIMP".to_string(),
        5 => "REFUSED".to_string(),
        other => format!("RCODE{}", other),
    }
}

/// A query log sink. Only ever driven by the single consumer task of a
/// `QueryLoggingResolver`, hence `&mut self` and no internal locking.
#[async_trait::async_trait]
pub trait QueryLogWriter: Send {
    /// Records one entry. Failures are logged and the entry is dropped.
    async fn write(&mut self, entry: &LogEntry);

    /// Pushes out anything buffered.
    async fn flush(&mut self) {}

    /// Removes data older than the retention window.
    async fn clean_up(&mut self);
}
