//! Network module: per-port result types, the probe seam, and name resolution

pub mod resolver;
pub mod socket;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

pub use resolver::AddressResolver;
pub use socket::TcpConnectProber;

/// Terminal state of a single port probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Connect completed within the timeout
    Open,
    /// Refused, reset, unreachable or any other OS-level connect error
    Closed,
    /// No answer before the timeout expired
    Timeout,
}

impl PortState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
            PortState::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Scan result for a single port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortResult {
    pub port: u16,
    pub status: PortState,
    /// Connect latency in milliseconds, only present for open ports
    pub latency_ms: Option<f64>,
}

impl PortResult {
    pub fn open(port: u16, latency: Duration) -> Self {
        Self {
            port,
            status: PortState::Open,
            latency_ms: Some(round_ms(latency)),
        }
    }

    pub fn closed(port: u16) -> Self {
        Self {
            port,
            status: PortState::Closed,
            latency_ms: None,
        }
    }

    pub fn timed_out(port: u16) -> Self {
        Self {
            port,
            status: PortState::Timeout,
            latency_ms: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PortState::Open
    }
}

/// Milliseconds rounded to two decimals
pub fn round_ms(elapsed: Duration) -> f64 {
    round2(elapsed.as_secs_f64() * 1000.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One bounded-time connection attempt against `(ip, port)`.
///
/// Implementations must map every network-level failure onto a [`PortState`];
/// only contract violations such as port 0 may return `Err`.
#[async_trait]
pub trait PortProber: Send + Sync {
    async fn probe(&self, ip: IpAddr, port: u16, timeout: Duration) -> crate::Result<PortResult>;

    /// Get prober name
    fn name(&self) -> &str;
}
