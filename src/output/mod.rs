//! Output formatting and management

use crate::network::PortState;
use crate::scanner::ScanResponse;
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub colored: bool,
    /// List closed and timed-out ports in text output
    pub show_closed: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
            show_closed: false,
        }
    }
}

/// Main output manager
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Write scan results to the configured file or stdout
    pub fn write_results(&self, response: &ScanResponse, started: DateTime<Utc>) -> crate::Result<()> {
        let output = self.render(response, started)?;

        match &self.config.file {
            Some(filename) => {
                let mut file = File::create(filename)?;
                file.write_all(output.as_bytes())?;
            }
            None => print!("{}", output),
        }

        Ok(())
    }

    /// Render a response in the configured format
    pub fn render(&self, response: &ScanResponse, started: DateTime<Utc>) -> crate::Result<String> {
        match self.config.format {
            OutputFormat::Text => Ok(self.format_text(response, started)),
            OutputFormat::Json => format_json(response),
            OutputFormat::Csv => format_csv(response),
        }
    }

    fn format_text(&self, response: &ScanResponse, started: DateTime<Utc>) -> String {
        let summary = &response.scan_summary;
        let mut output = String::new();

        output.push_str(&format!(
            "Scan of {} ({}) started {}\n\n",
            response.host,
            response.resolved_ip,
            started.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        for result in &response.results {
            let line = match (result.status, result.latency_ms) {
                (PortState::Open, Some(latency)) => {
                    format!("  {:<6} {:<8} {:.2}ms\n", result.port, result.status, latency)
                }
                _ if !self.config.show_closed => continue,
                _ => format!("  {:<6} {}\n", result.port, result.status),
            };
            output.push_str(&self.colorize(&line, result.status));
        }

        output.push_str(&format!(
            "\n{} ports scanned: {} open, {} closed, {} timed out, avg latency {:.2}ms\n",
            summary.total_ports,
            summary.open_ports,
            summary.closed_ports,
            summary.timeout_ports(),
            summary.avg_latency_ms
        ));

        output
    }

    fn colorize(&self, text: &str, state: PortState) -> String {
        if !self.config.colored {
            return text.to_string();
        }
        match state {
            PortState::Open => text.bright_green().to_string(),
            PortState::Closed => text.bright_black().to_string(),
            PortState::Timeout => text.yellow().to_string(),
        }
    }
}

/// Format results as pretty JSON in the response wire shape
pub fn format_json(response: &ScanResponse) -> crate::Result<String> {
    let mut json = serde_json::to_string_pretty(response)?;
    json.push('\n');
    Ok(json)
}

/// Format per-port results as CSV
pub fn format_csv(response: &ScanResponse) -> crate::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["port", "status", "latencyMs"])?;

    for result in &response.results {
        let latency = result
            .latency_ms
            .map(|ms| format!("{:.2}", ms))
            .unwrap_or_default();
        writer.write_record([result.port.to_string(), result.status.to_string(), latency])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| crate::ScanError::UnexpectedError(format!("csv flush failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| crate::ScanError::UnexpectedError(format!("csv output not utf-8: {}", e)))
}
