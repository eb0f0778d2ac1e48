//! netinspect - concurrent TCP connect scanning behind an SSRF guard
//!
//! A request names a host, a port range and a per-port timeout. The host is
//! resolved once and refused if it lands on a private, loopback or reserved
//! address; every port in the range is then probed exactly once under a
//! bounded number of in-flight connects, and the outcomes are summarised.

pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;

// Re-export commonly used types
pub use config::ScanConfig;
pub use error::{ErrorClass, ScanError};
pub use network::{AddressResolver, PortProber, PortResult, PortState, TcpConnectProber};
pub use scanner::{aggregate, ScanEngine, ScanPlan, ScanRequest, ScanResponse, ScanScheduler, ScanSummary};

pub type Result<T> = std::result::Result<T, ScanError>;
