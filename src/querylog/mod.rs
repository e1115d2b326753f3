pub mod console_writer;
pub mod database_writer;
pub mod error;
pub mod file_writer;
pub mod none_writer;
pub mod retention;
pub mod sanitize;
pub mod types;

pub use self::console_writer::ConsoleWriter;
pub use self::database_writer::DatabaseWriter;
pub use self::error::{WriterError, WriterResult};
pub use self::file_writer::{format_row, CsvFileWriter};
pub use self::none_writer::NoneWriter;
pub use self::retention::RetentionSweeper;
pub use self::sanitize::sanitize_file_name;
pub use self::types::{LogEntry, QueryLogWriter, RecordSummary};

use crate::config::{QueryLogConfig, QueryLogType};

/// Makes a single attempt at building the writer for `log_type`.
pub async fn create_writer(
    log_type: QueryLogType,
    config: &QueryLogConfig,
) -> WriterResult<Box<dyn QueryLogWriter>> {
    let retention = config.log_retention_days;
    let writer: Box<dyn QueryLogWriter> = match log_type {
        QueryLogType::None => Box::new(NoneWriter),
        QueryLogType::Console => Box::new(ConsoleWriter::new()),
        QueryLogType::Csv => Box::new(CsvFileWriter::new(&config.target, false, retention).await?),
        QueryLogType::CsvClient => {
            Box::new(CsvFileWriter::new(&config.target, true, retention).await?)
        }
        QueryLogType::Mysql => Box::new(DatabaseWriter::mysql(&config.target, retention).await?),
        QueryLogType::Postgresql => {
            Box::new(DatabaseWriter::postgres(&config.target, retention).await?)
        }
    };
    Ok(writer)
}
