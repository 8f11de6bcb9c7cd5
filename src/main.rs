//! Command-line entry point.
//!
//! Initializes tracing, resolves configuration, then runs the refresh task at
//! startup and every interval until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_keepalive::config::DEFAULT_LOG_FILTER;
use session_keepalive::{KeepAliveConfig, Overrides, RefreshTask, Scheduler};

/// Keeps a remote editor session alive by POSTing to it every minute
#[derive(Parser, Debug)]
#[command(name = "session-keepalive", version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint to POST to
    #[arg(long)]
    url: Option<String>,

    /// Full `Cookie` header value copied from a live browser session
    #[arg(long, conflicts_with = "cookie_file")]
    cookie: Option<String>,

    /// File holding the `Cookie` header value, re-read before every request
    #[arg(long)]
    cookie_file: Option<PathBuf>,

    /// URL the request is expected to land on after redirects
    #[arg(long)]
    expected_url: Option<String>,

    /// Seconds between scheduled refreshes
    #[arg(short, long)]
    interval: Option<u64>,

    /// Run a single refresh and exit instead of scheduling
    #[arg(long)]
    once: bool,

    /// Log level filter (e.g., "session_keepalive=debug")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Priority: CLI > env > default
    let log_filter = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let overrides = Overrides {
        url: args.url,
        cookie: args.cookie,
        cookie_file: args.cookie_file,
        expected_url: args.expected_url,
        interval_secs: args.interval,
    };
    let config = KeepAliveConfig::load(args.config.as_deref(), overrides)?;
    tracing::debug!(?config, "loaded configuration");

    let task = RefreshTask::from_config(&config);

    if args.once {
        return Ok(match task.run().await {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %err, "refresh failed");
                ExitCode::FAILURE
            }
        });
    }

    tracing::info!("starting session keep-alive");
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "refreshing {} every {} seconds",
        config.url,
        config.interval.as_secs()
    );
    tracing::info!("press Ctrl+C to stop");

    Scheduler::new(task, config.interval)
        .run_until(shutdown_signal())
        .await;

    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
