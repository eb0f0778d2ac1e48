use clap::{Arg, ArgAction, Command};
use colored::*;
use std::process;

use netinspect::{
    config::ScanConfig,
    output::{OutputConfig, OutputFormat, OutputManager},
    ScanEngine, ScanError, ScanRequest,
};

/// Parse `PORT` or `START-END` into an inclusive pair.
/// Range checks are left to request validation so the messages match.
fn parse_port_spec(spec: &str) -> netinspect::Result<(u32, u32)> {
    let spec = spec.trim();
    let parse = |field: &str, value: &str| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|_| ScanError::ValidationError(format!("{} must be between 1 and 65535", field)))
    };

    match spec.split_once('-') {
        Some((start, end)) => Ok((parse("startPort", start)?, parse("endPort", end)?)),
        None => {
            let port = parse("port", spec)?;
            Ok((port, port))
        }
    }
}

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(limit: u64) {
    use rlimit::Resource;

    match Resource::NOFILE.set(limit, limit) {
        Ok(()) => log::info!("Raised file descriptor limit to {}", limit),
        Err(e) => eprintln!("{} {}", "[!] Failed to set ulimit value:".bright_red(), e),
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_limit: u64) {}

fn build_cli() -> Command {
    Command::new("netinspect")
        .version(env!("CARGO_PKG_VERSION"))
        .about("TCP connect scanner that refuses private and reserved targets")
        .arg(
            Arg::new("target")
                .value_name("HOST")
                .help("Hostname or public IP address to scan")
                .required_unless_present("request")
                .index(1),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("PORTS")
                .help("Port or inclusive range, e.g. 443 or 1-1024")
                .default_value("1-1024"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Per-port connect timeout in milliseconds")
                .default_value("1000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("request")
                .short('r')
                .long("request")
                .value_name("FILE")
                .help("Read a JSON scan request {host, startPort, endPort, timeoutMs} instead")
                .conflicts_with_all(["target", "ports", "timeout"]),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("N")
                .help("Override the per-request concurrency cap")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .help("Output format: text, json, csv")
                .default_value("text"),
        )
        .arg(
            Arg::new("output-file")
                .long("output-file")
                .value_name("FILE")
                .help("Write results to FILE instead of stdout"),
        )
        .arg(
            Arg::new("show-closed")
                .long("show-closed")
                .help("List closed and timed-out ports in text output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored text output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Engine limits TOML file (default ~/.netinspect.toml)"),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Automatically increase ulimit to this value")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging unless RUST_LOG says otherwise")
                .action(ArgAction::SetTrue),
        )
}

/// Build the request from a JSON file or the command line.
/// A request that cannot be read or parsed is the caller's fault.
fn read_request(matches: &clap::ArgMatches) -> netinspect::Result<ScanRequest> {
    if let Some(path) = matches.get_one::<String>("request") {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScanError::ValidationError(format!("Cannot read request file {}: {}", path, e))
        })?;
        return serde_json::from_str(&content)
            .map_err(|e| ScanError::ValidationError(format!("Invalid scan request: {}", e)));
    }

    let Some(host) = matches.get_one::<String>("target") else {
        return Err(ScanError::ValidationError("Host cannot be empty".to_string()));
    };
    let port_spec = matches.get_one::<String>("ports").map(String::as_str).unwrap_or("1-1024");
    let (start_port, end_port) = parse_port_spec(port_spec)?;
    let timeout_ms = matches.get_one::<u64>("timeout").copied().unwrap_or(1000);

    Ok(ScanRequest::new(host.clone(), start_port, end_port, timeout_ms))
}

fn load_config(matches: &clap::ArgMatches) -> anyhow::Result<ScanConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::from_toml_file(path)?,
        None => ScanConfig::load_default_config(),
    };

    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        config = config.with_max_concurrent(concurrency);
    }

    Ok(config)
}

fn report_and_exit(err: &ScanError) -> ! {
    if err.is_client_error() {
        eprintln!("{} {}", "[!]".bright_yellow(), err.public_message());
        process::exit(2);
    }

    log::error!("Scan failed: {}", err);
    eprintln!("{} {}", "[!]".bright_red(), err.public_message());
    process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Some(&limit) = matches.get_one::<u64>("ulimit") {
        adjust_ulimit_size(limit);
    }

    let format: OutputFormat = matches
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("text")
        .parse()
        .map_err(anyhow::Error::msg)?;

    let config = load_config(&matches)?;
    let request = match read_request(&matches) {
        Ok(request) => request,
        Err(e) => report_and_exit(&e),
    };
    let engine = ScanEngine::new(config)?;

    let started = chrono::Utc::now();
    let response = match engine.scan(&request).await {
        Ok(response) => response,
        Err(e) => report_and_exit(&e),
    };

    let output = OutputManager::new(OutputConfig {
        format,
        file: matches.get_one::<String>("output-file").cloned(),
        colored: !matches.get_flag("no-color"),
        show_closed: matches.get_flag("show-closed"),
    });

    if let Err(e) = output.write_results(&response, started) {
        report_and_exit(&e);
    }

    Ok(())
}
