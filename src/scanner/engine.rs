//! Main scanning engine implementation

use crate::config::ScanConfig;
use crate::network::{AddressResolver, PortProber, PortResult, TcpConnectProber};
use crate::scanner::{ScanRequest, ScanResponse};
use crate::ScanError;
use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Fans one probe per port out across a bounded number of in-flight tasks.
///
/// Each call to [`ScanScheduler::scan`] gets its own admission gate sized to
/// `max_concurrent`. When a global gate is attached, a task must also hold a
/// permit from it, which bounds fan-out across every request sharing it.
#[derive(Clone)]
pub struct ScanScheduler {
    prober: Arc<dyn PortProber>,
    max_concurrent: usize,
    max_port_range: u16,
    global_gate: Option<Arc<Semaphore>>,
}

impl ScanScheduler {
    pub fn new(prober: Arc<dyn PortProber>, config: &ScanConfig) -> Self {
        Self {
            prober,
            max_concurrent: config.max_concurrent.clamp(1, Semaphore::MAX_PERMITS),
            max_port_range: config.max_port_range,
            global_gate: None,
        }
    }

    /// Share `gate` with every other scheduler holding the same `Arc`
    pub fn with_global_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.global_gate = Some(gate);
        self
    }

    /// Probe every port in `start_port..=end_port` and return results in
    /// ascending port order.
    ///
    /// All probes run to completion before this returns. A port's outcome
    /// never affects its siblings; only a failed task (panic or a prober
    /// contract violation) fails the whole range, and only after every other
    /// task has finished.
    pub async fn scan(
        &self,
        ip: IpAddr,
        start_port: u16,
        end_port: u16,
        timeout: Duration,
    ) -> crate::Result<Vec<PortResult>> {
        if start_port == 0 || end_port < start_port {
            return Err(ScanError::ValidationError(format!(
                "invalid port range {}-{}",
                start_port, end_port
            )));
        }
        if end_port - start_port > self.max_port_range {
            return Err(ScanError::ValidationError(format!(
                "Port range cannot exceed {}",
                self.max_port_range
            )));
        }

        let gate = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(usize::from(end_port - start_port) + 1);

        for port in start_port..=end_port {
            let gate = gate.clone();
            let global_gate = self.global_gate.clone();
            let prober = self.prober.clone();

            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire_owned().await.map_err(gate_closed)?;
                let _global_permit = match global_gate {
                    Some(global) => Some(global.acquire_owned().await.map_err(gate_closed)?),
                    None => None,
                };
                prober.probe(ip, port, timeout).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut first_error = None;

        for outcome in join_all(handles).await {
            match outcome {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(join_error) => {
                    first_error.get_or_insert(join_error.into());
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

fn gate_closed(e: tokio::sync::AcquireError) -> ScanError {
    ScanError::UnexpectedError(format!("admission gate closed: {}", e))
}

/// Request pipeline: validate, resolve once, scan, aggregate.
///
/// Holds no per-request state; one engine may serve any number of
/// concurrent requests.
pub struct ScanEngine {
    config: ScanConfig,
    resolver: AddressResolver,
    scheduler: ScanScheduler,
}

impl ScanEngine {
    /// Create a new scan engine probing with real TCP connects
    pub fn new(config: ScanConfig) -> crate::Result<Self> {
        Self::with_prober(config, Arc::new(TcpConnectProber::new()))
    }

    /// Create an engine around a custom prober
    pub fn with_prober(config: ScanConfig, prober: Arc<dyn PortProber>) -> crate::Result<Self> {
        config.validate()?;

        let mut scheduler = ScanScheduler::new(prober, &config);
        if let Some(limit) = config.global_max_concurrent {
            let limit = limit.min(Semaphore::MAX_PERMITS);
            scheduler = scheduler.with_global_gate(Arc::new(Semaphore::new(limit)));
        }

        log::debug!(
            "Engine ready: {} probe, {} per request, global cap {:?}",
            scheduler.prober.name(),
            scheduler.max_concurrent,
            config.global_max_concurrent
        );

        Ok(Self {
            config,
            resolver: AddressResolver::new(),
            scheduler,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run one scan request end to end.
    ///
    /// Validation and resolution failures return before any port is probed.
    pub async fn scan(&self, request: &ScanRequest) -> crate::Result<ScanResponse> {
        let scan_id = Uuid::new_v4();
        let start_time = Instant::now();

        let plan = request.validate(&self.config).map_err(|e| {
            log::warn!("[{}] Validation error: {}", scan_id, e);
            e
        })?;

        log::info!(
            "[{}] Scan request: {} ports {}-{}",
            scan_id,
            plan.host,
            plan.start_port,
            plan.end_port
        );

        let ip = self.resolver.resolve(&plan.host).await?;

        let results = self
            .scheduler
            .scan(ip, plan.start_port, plan.end_port, plan.timeout)
            .await
            .map_err(|e| {
                log::error!("[{}] Scan error: {}", scan_id, e);
                e
            })?;

        let response = ScanResponse::new(plan.host, ip, results);

        log::info!(
            "[{}] Scan complete: {} open ports found in {:?}",
            scan_id,
            response.scan_summary.open_ports,
            start_time.elapsed()
        );

        Ok(response)
    }
}
