pub mod query_logging;
pub mod types;
pub mod upstream;

use crate::config::Config;
use anyhow::{bail, ensure, Context, Result};
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver as HickoryResolver, TokioResolver};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub use self::query_logging::{QueryLoggingResolver, QueryLogStats, QUEUE_CAPACITY};
pub use self::types::{ChainedResolver, Request, Resolver, Response, ResponseType, Upstream};
pub use self::upstream::UpstreamResolver;

/// One `upstream_servers` entry, e.g. `tls://dns.quad9.net` or `9.9.9.9:53`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// As configured; used in logs and response reasons.
    pub url: String,
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl UpstreamTarget {
    /// Accepts `scheme://host[:port]`, or a bare `host[:port]` meaning plain UDP.
    pub fn parse(raw: &str) -> Result<Self> {
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("udp://{}", raw)
        };
        let url = Url::parse(&with_scheme).with_context(|| format!("Invalid upstream '{}'", raw))?;

        let protocol = match url.scheme() {
            "udp" => Protocol::Udp,
            "tcp" => Protocol::Tcp,
            "tls" | "dot" => Protocol::Tls,
            "https" | "doh" => Protocol::Https,
            "quic" | "doq" => Protocol::Quic,
            "h3" => Protocol::H3,
            other => bail!("Unsupported scheme '{}' in upstream '{}'", other, raw),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .with_context(|| format!("Upstream '{}' has no host", raw))?
            .trim_matches(|c: char| c == '[' || c == ']')
            .to_string();

        let port = url.port().unwrap_or(match protocol {
            Protocol::Tls | Protocol::Quic => 853,
            Protocol::Https | Protocol::H3 => 443,
            _ => 53,
        });

        Ok(Self {
            url: raw.to_string(),
            protocol,
            host,
            port,
        })
    }

    fn is_encrypted(&self) -> bool {
        !matches!(self.protocol, Protocol::Udp | Protocol::Tcp)
    }

    /// Resolver talking to this upstream only, at `ip`.
    fn build(&self, ip: IpAddr, timeout: Duration) -> TokioResolver {
        let mut name_server = NameServerConfig::new(SocketAddr::new(ip, self.port), self.protocol);
        if self.is_encrypted() {
            name_server.tls_dns_name = Some(self.host.clone());
        }

        let mut resolver_config = ResolverConfig::new();
        resolver_config.add_name_server(name_server);

        let mut opts = ResolverOpts::default();
        // Caching and failover happen in the chain, not in hickory.
        opts.cache_size = 0;
        opts.attempts = 1;
        opts.timeout = timeout;

        HickoryResolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
            .with_options(opts)
            .build()
    }
}

/// Plain DNS resolver for upstream host names, from `bootstrap_dns`.
fn bootstrap_resolver(servers: &[String]) -> TokioResolver {
    let mut resolver_config = ResolverConfig::new();
    for server in servers {
        let addr = server
            .parse::<SocketAddr>()
            .or_else(|_| server.parse::<IpAddr>().map(|ip| SocketAddr::new(ip, 53)));
        match addr {
            Ok(addr) => resolver_config.add_name_server(NameServerConfig::new(addr, Protocol::Udp)),
            Err(_) => warn!("Ignoring invalid bootstrap server '{}'", server),
        }
    }
    if resolver_config.name_servers().is_empty() {
        resolver_config = ResolverConfig::google();
    }

    HickoryResolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
        .build()
}

async fn lookup_host(bootstrap: &TokioResolver, host: &str) -> Result<IpAddr> {
    let lookup = bootstrap
        .lookup_ip(host)
        .await
        .with_context(|| format!("Bootstrap lookup of {} failed", host))?;
    lookup
        .iter()
        .next()
        .with_context(|| format!("Bootstrap lookup of {} returned no address", host))
}

/// Builds the chain tail from `upstream_servers`. Unusable entries are
/// skipped with a warning; having none left is an error.
pub async fn create_upstream_resolver(config: &Config) -> Result<UpstreamResolver> {
    let timeout = Duration::from_millis(config.upstream_timeout_ms);
    let mut bootstrap: Option<TokioResolver> = None;
    let mut upstreams = Vec::new();

    for raw in &config.upstream_servers {
        let target = match UpstreamTarget::parse(raw) {
            Ok(target) => target,
            Err(e) => {
                warn!("Skipping upstream: {:#}", e);
                continue;
            }
        };

        let ip = match target.host.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => {
                let bootstrap =
                    bootstrap.get_or_insert_with(|| bootstrap_resolver(&config.bootstrap_dns));
                match lookup_host(bootstrap, &target.host).await {
                    Ok(ip) => ip,
                    Err(e) => {
                        warn!("Skipping upstream {}: {:#}", target.url, e);
                        continue;
                    }
                }
            }
        };

        info!(
            "Upstream {} -> {}:{} ({:?})",
            target.url, ip, target.port, target.protocol
        );
        upstreams.push(Upstream {
            url: target.url.clone(),
            resolver: target.build(ip, timeout),
        });
    }

    ensure!(!upstreams.is_empty(), "No usable entry in upstream_servers");
    Ok(UpstreamResolver::new(upstreams))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_address_is_udp() {
        let target = UpstreamTarget::parse("9.9.9.9").unwrap();
        assert_eq!(target.protocol, Protocol::Udp);
        assert_eq!(target.host, "9.9.9.9");
        assert_eq!(target.port, 53);

        let target = UpstreamTarget::parse("9.9.9.9:5353").unwrap();
        assert_eq!(target.port, 5353);
        assert_eq!(target.url, "9.9.9.9:5353");
    }

    #[test]
    fn test_default_ports_per_scheme() {
        let port = |raw: &str| UpstreamTarget::parse(raw).unwrap().port;
        assert_eq!(port("tcp://1.1.1.1"), 53);
        assert_eq!(port("tls://dns.quad9.net"), 853);
        assert_eq!(port("quic://dns.adguard.com"), 853);
        assert_eq!(port("https://dns.google"), 443);
        assert_eq!(port("h3://dns.google"), 443);
        assert_eq!(port("tls://dns.quad9.net:8853"), 8853);
    }

    #[test]
    fn test_ipv6_host() {
        let target = UpstreamTarget::parse("udp://[2620:fe::fe]:53").unwrap();
        assert_eq!(target.host, "2620:fe::fe");
        assert!(target.host.parse::<IpAddr>().is_ok());
    }

    #[test]
    fn test_encryption_by_protocol() {
        assert!(!UpstreamTarget::parse("tcp://1.1.1.1").unwrap().is_encrypted());
        assert!(UpstreamTarget::parse("https://dns.google").unwrap().is_encrypted());
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        assert!(UpstreamTarget::parse("ftp://1.1.1.1").is_err());
        assert!(UpstreamTarget::parse("udp://").is_err());
    }

    #[tokio::test]
    async fn test_no_usable_upstream_is_an_error() {
        let config = Config {
            upstream_servers: vec!["ftp://1.1.1.1".to_string()],
            ..Config::default()
        };
        assert!(create_upstream_resolver(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_ip_upstreams_need_no_bootstrap() {
        let config = Config {
            upstream_servers: vec!["udp://192.0.2.1".to_string(), "192.0.2.2:5353".to_string()],
            bootstrap_dns: Vec::new(),
            ..Config::default()
        };
        let resolver = create_upstream_resolver(&config).await.unwrap();
        assert_eq!(
            resolver.configuration(),
            vec![
                "upstream[0]: udp://192.0.2.1".to_string(),
                "upstream[1]: 192.0.2.2:5353".to_string(),
            ]
        );
    }
}
