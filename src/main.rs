use anyhow::Result;
use sieve_dns::config::Config;
use sieve_dns::init::{build_chain, setup_logging};
use sieve_dns::server::{self, DnsHandler};
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let (config, from_file) = Config::load_or_default(&config_path).await?;

    setup_logging(&config);
    if from_file {
        info!("Starting sieve-dns with {}", config_path);
    } else {
        warn!("{} not found, starting sieve-dns with defaults", config_path);
    }

    let chain = build_chain(&config).await?;
    let handler = DnsHandler::new(&config, chain);

    server::serve(handler, config.listen_addr()?, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
