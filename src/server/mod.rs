pub mod dns_request_handler;

pub use self::dns_request_handler::DnsHandler;

use anyhow::{Context, Result};
use hickory_server::ServerFuture;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tracing::info;

/// Idle timeout for TCP clients.
const TCP_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves `handler` over UDP and TCP on `addr` until `shutdown` completes.
pub async fn serve(
    handler: DnsHandler,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut server = ServerFuture::new(handler);

    let udp = UdpSocket::bind(addr)
        .await
        .with_context(|| format!("Failed to bind udp {}", addr))?;
    server.register_socket(udp);

    let tcp = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind tcp {}", addr))?;
    server.register_listener(tcp, TCP_TIMEOUT);

    info!("DNS server listening on {} (udp, tcp)", addr);

    tokio::select! {
        result = server.block_until_done() => result.context("DNS server stopped")?,
        _ = shutdown => info!("Shutdown signal received."),
    }
    Ok(())
}
