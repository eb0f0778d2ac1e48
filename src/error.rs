//! Error handling for the netinspect scanner
//!
//! Request-level failures only. Per-port outcomes (open, closed, timeout) are
//! data carried in [`crate::network::PortResult`] and never appear here.

use std::net::IpAddr;
use thiserror::Error;

/// Opaque message handed to callers for server-class failures
pub const PUBLIC_SERVER_ERROR: &str = "Scan failed";

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Cannot resolve hostname: {0}")]
    ResolutionError(String),

    #[error("Cannot scan private/internal IP: {0}")]
    SsrfBlockedError(IpAddr),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

/// Outward classification of an error, independent of any transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself was at fault; safe to report verbatim
    Client,
    /// Something broke inside the scanner; details stay in the logs
    Server,
}

impl ScanError {
    /// Classify the error for outward reporting
    pub fn class(&self) -> ErrorClass {
        match self {
            ScanError::ValidationError(_)
            | ScanError::ResolutionError(_)
            | ScanError::SsrfBlockedError(_) => ErrorClass::Client,
            ScanError::ConfigError(_) | ScanError::IoError(_) | ScanError::UnexpectedError(_) => {
                ErrorClass::Server
            }
        }
    }

    /// HTTP-style status code for a transport binding
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::Client => 400,
            ErrorClass::Server => 500,
        }
    }

    /// Message that may be shown to the caller.
    ///
    /// Server-class errors collapse to [`PUBLIC_SERVER_ERROR`] so no internal
    /// detail leaks; log the error itself before discarding it.
    pub fn public_message(&self) -> String {
        match self.class() {
            ErrorClass::Client => self.to_string(),
            ErrorClass::Server => PUBLIC_SERVER_ERROR.to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.class() == ErrorClass::Client
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(e: tokio::task::JoinError) -> Self {
        ScanError::UnexpectedError(format!("probe task failed: {}", e))
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(e: toml::de::Error) -> Self {
        ScanError::ConfigError(format!("Failed to parse TOML: {}", e))
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::UnexpectedError(format!("serialization failed: {}", e))
    }
}

impl From<csv::Error> for ScanError {
    fn from(e: csv::Error) -> Self {
        ScanError::UnexpectedError(format!("csv output failed: {}", e))
    }
}
