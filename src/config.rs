use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_upstream_servers")]
    pub upstream_servers: Vec<String>,

    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    #[serde(default = "default_bootstrap_dns")]
    pub bootstrap_dns: Vec<String>,

    /// Static client IP -> names mapping, used to label log entries.
    #[serde(default)]
    pub client_names: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub query_log: QueryLogConfig,
}

/// Process (tracing) logging.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Sink selected for the query log.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum QueryLogType {
    None,
    Console,
    Csv,
    CsvClient,
    Mysql,
    Postgresql,
}

impl QueryLogType {
    /// Writers that produce date-stamped files under `target`.
    pub fn is_file_based(self) -> bool {
        matches!(self, QueryLogType::Csv | QueryLogType::CsvClient)
    }

    /// Writers whose creation may fail only because the backend isn't up yet.
    pub fn is_database(self) -> bool {
        matches!(self, QueryLogType::Mysql | QueryLogType::Postgresql)
    }
}

impl fmt::Display for QueryLogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryLogType::None => "none",
            QueryLogType::Console => "console",
            QueryLogType::Csv => "csv",
            QueryLogType::CsvClient => "csv-client",
            QueryLogType::Mysql => "mysql",
            QueryLogType::Postgresql => "postgresql",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryLogConfig {
    /// Directory for the csv writers, DSN for the database writers.
    #[serde(default)]
    pub target: String,
    #[serde(rename = "type", default = "default_query_log_type")]
    pub log_type: QueryLogType,
    /// 0 keeps everything.
    #[serde(default)]
    pub log_retention_days: u64,
    #[serde(default = "default_creation_attempts")]
    pub creation_attempts: u32,
    #[serde(default = "default_creation_cooldown_ms")]
    pub creation_cooldown_ms: u64,
}

impl QueryLogConfig {
    pub fn creation_cooldown(&self) -> Duration {
        Duration::from_millis(self.creation_cooldown_ms)
    }
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5300
}
fn default_upstream_timeout_ms() -> u64 {
    2000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_query_log_type() -> QueryLogType {
    QueryLogType::Console
}
fn default_creation_attempts() -> u32 {
    3
}
fn default_creation_cooldown_ms() -> u64 {
    2000
}
fn default_upstream_servers() -> Vec<String> {
    vec!["udp://8.8.8.8:53".to_string()]
}
fn default_bootstrap_dns() -> Vec<String> {
    vec!["8.8.8.8:53".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream_servers: default_upstream_servers(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            bootstrap_dns: default_bootstrap_dns(),
            client_names: HashMap::new(),
            logging: LoggingConfig::default(),
            query_log: QueryLogConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for QueryLogConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            log_type: default_query_log_type(),
            log_retention_days: 0,
            creation_attempts: default_creation_attempts(),
            creation_cooldown_ms: default_creation_cooldown_ms(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::parse(&contents)
    }

    /// Loads `path` if it exists, defaults otherwise. The flag tells which.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Ok((Self::load(path).await?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config TOML")?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid listen host '{}'", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
