//! TCP connect probing

use crate::network::{PortProber, PortResult};
use crate::ScanError;
use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Full-handshake TCP prober. No privileges required.
///
/// A connection that completes is dropped immediately without exchanging data.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProber;

impl TcpConnectProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortProber for TcpConnectProber {
    async fn probe(&self, ip: IpAddr, port: u16, limit: Duration) -> crate::Result<PortResult> {
        if port == 0 {
            return Err(ScanError::ValidationError("port 0 cannot be probed".to_string()));
        }

        let addr = SocketAddr::new(ip, port);
        Ok(classify_connect(addr, limit, TcpStream::connect(addr)).await)
    }

    fn name(&self) -> &str {
        "TCP Connect"
    }
}

/// Race `connect` against `limit` and map the outcome onto a port state
async fn classify_connect<F, S>(addr: SocketAddr, limit: Duration, connect: F) -> PortResult
where
    F: Future<Output = io::Result<S>>,
{
    let start = Instant::now();

    match timeout(limit, connect).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed();
            drop(stream);
            PortResult::open(addr.port(), elapsed)
        }
        Ok(Err(e)) => {
            log::debug!("{} closed: {}", addr, e);
            PortResult::closed(addr.port())
        }
        Err(_elapsed) => {
            log::debug!("{} timed out after {:?}", addr, limit);
            PortResult::timed_out(addr.port())
        }
    }
}
