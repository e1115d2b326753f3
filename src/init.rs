//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::resolver::{ChainedResolver, QueryLoggingResolver, Resolver};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Crates that are silenced unless the configured level names them.
const QUIET_TARGETS: &[(&str, &str)] = &[
    ("hickory_server", "off"),
    ("hickory_proto", "off"),
    ("hickory_resolver", "off"),
    ("sqlx", "warn"),
];

/// Filter directives for `level`, used when `RUST_LOG` is not set.
pub fn default_filter(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    directives.extend(
        QUIET_TARGETS
            .iter()
            .filter(|(target, _)| !level.contains(target))
            .map(|(target, quiet)| format!("{}={}", target, quiet)),
    );
    directives.join(",")
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the config.
pub fn setup_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.logging.level)));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Builds the resolver chain: query logging, then the upstream forwarders.
pub async fn build_chain(config: &Config) -> Result<Arc<dyn Resolver>> {
    let upstream: Arc<dyn Resolver> =
        Arc::new(crate::resolver::create_upstream_resolver(config).await?);

    let mut query_logging = QueryLoggingResolver::new(config.query_log.clone()).await;
    query_logging.set_next(upstream.clone());

    for line in query_logging.configuration() {
        info!("query_logging: {}", line);
    }
    for line in upstream.configuration() {
        info!("{}", line);
    }

    Ok(Arc::new(query_logging))
}
