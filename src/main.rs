#![forbid(unsafe_code)]

//! `mcp-probe`: exercises an MCP server over stdio or HTTP/SSE.
//!
//! Loads optional TOML configuration, applies CLI overrides, runs the
//! selected suite, and exits non-zero if any scenario failed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use mcp_probe::config::{HarnessConfig, IdMatching};
use mcp_probe::harness::http::{http_scenarios, run_http_suite};
use mcp_probe::harness::stdio::run_stdio_suite;
use mcp_probe::harness::SuiteReport;
use mcp_probe::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "mcp-probe", about = "MCP server conformance harness", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    transport: Transport,
}

#[derive(Debug, Subcommand)]
enum Transport {
    /// Spawn a server and talk JSON-RPC over its stdin/stdout.
    Stdio {
        /// Server binary; overrides `stdio.command`.
        #[arg(long)]
        command: Option<String>,

        /// Only accept a response whose id matches the request.
        #[arg(long)]
        strict_ids: bool,

        /// Arguments passed to the server binary; override `stdio.args`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Connect to a running server over HTTP POST + SSE.
    Http {
        /// Server base URL; overrides `http.base_url`.
        #[arg(long)]
        base_url: Option<String>,
    },
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))
        .and_then(|runtime| runtime.block_on(run(args)));

    match result {
        Ok(report) if report.all_passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            error!(%err, "mcp-probe failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<SuiteReport> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load_from_path(path)?,
        None => HarnessConfig::default(),
    };

    let report = match args.transport {
        Transport::Stdio {
            command,
            strict_ids,
            args: server_args,
        } => {
            if command.is_some() {
                config.stdio.command = command;
            }
            if !server_args.is_empty() {
                config.stdio.args = server_args;
            }
            if strict_ids {
                config.stdio.id_matching = IdMatching::Strict;
            }
            config.validate()?;
            info!(command = ?config.stdio.command, "running stdio suite");
            run_stdio_suite(&config).await
        }
        Transport::Http { base_url } => {
            if let Some(base_url) = base_url {
                config.http.base_url = base_url;
            }
            config.validate()?;
            info!(base_url = %config.http.base_url, "running http suite");
            let scenarios = http_scenarios(&config.http.protocol_version);
            run_http_suite(&config.http, &scenarios).await
        }
    };

    report.log_summary();
    Ok(report)
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
