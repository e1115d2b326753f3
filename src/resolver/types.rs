use anyhow::Result;
use hickory_resolver::TokioResolver;
use hickory_server::proto::op::Message;
use hickory_server::proto::xfer::Protocol;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// A query travelling down the resolver chain.
#[derive(Debug, Clone)]
pub struct Request {
    pub client_ip: IpAddr,
    pub client_names: Vec<String>,
    pub protocol: Protocol,
    pub message: Message,
}

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Resolved,
    Cached,
    Blocked,
    Conditional,
    CustomDns,
    HostsFile,
    Filtered,
    NotFqdn,
    Special,
    /// The next link returned an error instead of a response.
    Failed,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseType::Resolved => "RESOLVED",
            ResponseType::Cached => "CACHED",
            ResponseType::Blocked => "BLOCKED",
            ResponseType::Conditional => "CONDITIONAL",
            ResponseType::CustomDns => "CUSTOMDNS",
            ResponseType::HostsFile => "HOSTSFILE",
            ResponseType::Filtered => "FILTERED",
            ResponseType::NotFqdn => "NOTFQDN",
            ResponseType::Special => "SPECIAL",
            ResponseType::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub message: Message,
    pub reason: String,
    pub response_type: ResponseType,
}

/// One link of the resolver chain.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, request: &Request) -> Result<Response>;

    /// Human readable description of the effective settings.
    fn configuration(&self) -> Vec<String>;
}

/// A link that hands requests on to another resolver.
pub trait ChainedResolver: Resolver {
    fn set_next(&mut self, next: Arc<dyn Resolver>);

    fn next(&self) -> Option<&Arc<dyn Resolver>>;
}

pub struct Upstream {
    pub url: String,
    pub resolver: TokioResolver,
}
