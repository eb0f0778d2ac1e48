//! Scanner module: request validation, result aggregation, and the engine

pub mod engine;

use crate::config::ScanConfig;
use crate::network::{round2, PortResult, PortState};
use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

pub use engine::{ScanEngine, ScanScheduler};

/// A scan as submitted by a caller, before any validation.
///
/// Integer fields are wider than their valid range; out-of-range values are
/// rejected by [`ScanRequest::validate`] with a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub host: String,
    pub start_port: u32,
    pub end_port: u32,
    pub timeout_ms: u64,
}

impl ScanRequest {
    pub fn new(host: impl Into<String>, start_port: u32, end_port: u32, timeout_ms: u64) -> Self {
        Self {
            host: host.into(),
            start_port,
            end_port,
            timeout_ms,
        }
    }

    /// Check every field against `config` and produce a typed plan.
    ///
    /// No network I/O happens here; a request that fails is rejected before
    /// anything is resolved or probed.
    pub fn validate(&self, config: &ScanConfig) -> crate::Result<ScanPlan> {
        let host_len = self.host.chars().count();
        if host_len == 0 || host_len > config.max_host_len {
            return Err(invalid(format!(
                "host must be between 1 and {} characters",
                config.max_host_len
            )));
        }

        let host = self.host.trim();
        if host.is_empty() {
            return Err(invalid("Host cannot be empty".to_string()));
        }

        let start_port = port_in_range("startPort", self.start_port)?;
        let end_port = port_in_range("endPort", self.end_port)?;

        if end_port < start_port {
            return Err(invalid("endPort must be >= startPort".to_string()));
        }
        if end_port - start_port > config.max_port_range {
            return Err(invalid(format!(
                "Port range cannot exceed {}",
                config.max_port_range
            )));
        }

        if self.timeout_ms < config.min_timeout_ms || self.timeout_ms > config.max_timeout_ms {
            return Err(invalid(format!(
                "timeoutMs must be between {} and {}",
                config.min_timeout_ms, config.max_timeout_ms
            )));
        }

        Ok(ScanPlan {
            host: host.to_string(),
            start_port,
            end_port,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

fn invalid(message: String) -> ScanError {
    ScanError::ValidationError(message)
}

fn port_in_range(field: &str, port: u32) -> crate::Result<u16> {
    match u16::try_from(port) {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(invalid(format!("{} must be between 1 and 65535", field))),
    }
}

/// A validated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    /// Trimmed host, as resolved and echoed back
    pub host: String,
    pub start_port: u16,
    pub end_port: u16,
    pub timeout: Duration,
}

impl ScanPlan {
    /// Number of ports in the inclusive range
    pub fn port_count(&self) -> usize {
        usize::from(self.end_port - self.start_port) + 1
    }
}

/// Derived counts over one scan's results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub total_ports: usize,
    pub open_ports: usize,
    pub closed_ports: usize,
    /// Mean open-port latency, 0 when nothing is open
    pub avg_latency_ms: f64,
}

impl ScanSummary {
    /// Ports that timed out; the bucket not reported on the wire
    pub fn timeout_ports(&self) -> usize {
        self.total_ports
            .saturating_sub(self.open_ports)
            .saturating_sub(self.closed_ports)
    }
}

/// Reduce per-port results into a [`ScanSummary`]
pub fn aggregate(results: &[PortResult]) -> ScanSummary {
    let mut summary = ScanSummary {
        total_ports: results.len(),
        ..Default::default()
    };
    let mut latency_total = 0.0;
    let mut latency_count = 0usize;

    for result in results {
        match result.status {
            PortState::Open => {
                summary.open_ports += 1;
                if let Some(latency) = result.latency_ms {
                    latency_total += latency;
                    latency_count += 1;
                }
            }
            PortState::Closed => summary.closed_ports += 1,
            PortState::Timeout => {}
        }
    }

    if latency_count > 0 {
        summary.avg_latency_ms = round2(latency_total / latency_count as f64);
    }

    summary
}

/// Complete result of one scan request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub host: String,
    pub resolved_ip: IpAddr,
    pub scan_summary: ScanSummary,
    /// Ascending by port
    pub results: Vec<PortResult>,
}

impl ScanResponse {
    pub fn new(host: String, resolved_ip: IpAddr, results: Vec<PortResult>) -> Self {
        Self {
            host,
            resolved_ip,
            scan_summary: aggregate(&results),
            results,
        }
    }

    /// Ports found open
    pub fn open_ports(&self) -> impl Iterator<Item = &PortResult> {
        self.results.iter().filter(|r| r.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> ScanConfig {
        ScanConfig::default()
    }

    fn validation_message(request: ScanRequest) -> String {
        match request.validate(&config()) {
            Err(ScanError::ValidationError(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_request_is_trimmed() {
        let plan = ScanRequest::new("  example.com ", 80, 90, 500)
            .validate(&config())
            .unwrap();
        assert_eq!(plan.host, "example.com");
        assert_eq!(plan.port_count(), 11);
        assert_eq!(plan.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_boundary_widths() {
        assert!(ScanRequest::new("a", 1, 1025, 100).validate(&config()).is_ok());
        assert_eq!(
            validation_message(ScanRequest::new("a", 1, 1026, 100)),
            "Port range cannot exceed 1024"
        );
        assert!(ScanRequest::new("a", 65535, 65535, 5000).validate(&config()).is_ok());
    }

    #[test]
    fn test_rejections() {
        assert_eq!(validation_message(ScanRequest::new("   ", 1, 2, 100)), "Host cannot be empty");
        assert!(validation_message(ScanRequest::new("", 1, 2, 100)).contains("host"));
        assert!(validation_message(ScanRequest::new("h".repeat(256), 1, 2, 100)).contains("255"));
        assert!(validation_message(ScanRequest::new("a", 0, 2, 100)).contains("startPort"));
        assert!(validation_message(ScanRequest::new("a", 1, 70000, 100)).contains("endPort"));
        assert_eq!(
            validation_message(ScanRequest::new("a", 10, 9, 100)),
            "endPort must be >= startPort"
        );
        assert!(validation_message(ScanRequest::new("a", 1, 2, 99)).contains("timeoutMs"));
        assert!(validation_message(ScanRequest::new("a", 1, 2, 5001)).contains("timeoutMs"));
    }

    #[test]
    fn test_request_accepts_camel_case_json() {
        let request: ScanRequest = serde_json::from_str(
            r#"{"host":"example.com","startPort":20,"endPort":25,"timeoutMs":1000}"#,
        )
        .unwrap();
        assert_eq!(request, ScanRequest::new("example.com", 20, 25, 1000));
    }

    #[test]
    fn test_aggregate_mixed() {
        let results = vec![
            PortResult::open(22, Duration::from_millis(10)),
            PortResult::closed(23),
            PortResult::timed_out(24),
            PortResult::open(25, Duration::from_millis(21)),
        ];
        let summary = aggregate(&results);
        assert_eq!(summary.total_ports, 4);
        assert_eq!(summary.open_ports, 2);
        assert_eq!(summary.closed_ports, 1);
        assert_eq!(summary.timeout_ports(), 1);
        assert_eq!(summary.avg_latency_ms, 15.5);
    }

    #[test]
    fn test_inconsistent_summary_does_not_underflow() {
        let summary: ScanSummary = serde_json::from_str(
            r#"{"totalPorts":1,"openPorts":3,"closedPorts":2,"avgLatencyMs":0.0}"#,
        )
        .unwrap();
        assert_eq!(summary.timeout_ports(), 0);
    }

    #[test]
    fn test_aggregate_nothing_open() {
        let summary = aggregate(&[PortResult::closed(1), PortResult::timed_out(2)]);
        assert_eq!(summary.avg_latency_ms, 0.0);
        assert_eq!(aggregate(&[]), ScanSummary::default());
    }

    #[test]
    fn test_response_wire_shape() {
        let response = ScanResponse::new(
            "example.com".to_string(),
            "93.184.216.34".parse().unwrap(),
            vec![PortResult::closed(80)],
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["resolvedIp"], "93.184.216.34");
        assert_eq!(json["scanSummary"]["totalPorts"], 1);
        assert_eq!(json["scanSummary"]["avgLatencyMs"], 0.0);
        assert_eq!(json["results"][0]["status"], "closed");
    }

    fn arb_result() -> impl Strategy<Value = PortResult> {
        (1u16..=65535, 0u8..3, 0u64..5000).prop_map(|(port, kind, micros)| match kind {
            0 => PortResult::open(port, Duration::from_micros(micros * 1000 + 7)),
            1 => PortResult::closed(port),
            _ => PortResult::timed_out(port),
        })
    }

    proptest! {
        #[test]
        fn prop_summary_partitions_results(results in prop::collection::vec(arb_result(), 0..300)) {
            let summary = aggregate(&results);
            let timeouts = results.iter().filter(|r| r.status == PortState::Timeout).count();
            prop_assert_eq!(summary.total_ports, summary.open_ports + summary.closed_ports + timeouts);

            if summary.open_ports == 0 {
                prop_assert_eq!(summary.avg_latency_ms, 0.0);
            } else {
                let open: Vec<f64> = results.iter().filter_map(|r| r.latency_ms).collect();
                let mean = open.iter().sum::<f64>() / open.len() as f64;
                prop_assert!((summary.avg_latency_ms - mean).abs() <= 0.005 + 1e-9);
            }
        }

        #[test]
        fn prop_width_limit(start in 1u32..=65535, width in 0u32..3000) {
            let end = start + width;
            let outcome = ScanRequest::new("example.com", start, end, 1000).validate(&config());
            prop_assert_eq!(outcome.is_ok(), end <= 65535 && width <= 1024);
        }
    }
}
