//! Pairline server binary
//!
//! Loads configuration, installs the tracing subscriber, serves the signaling
//! socket with its HTTP endpoints and drains on SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use pairline::config::{validate_config, AppConfig};
use pairline::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Pairline - anonymous peer matchmaking and WebRTC signaling relay
#[derive(Parser, Debug)]
#[command(
    name = "pairline",
    version,
    about = "Anonymous peer matchmaking and WebRTC signaling relay",
    long_about = "Pairline pairs anonymous participants by declared category preference and \
                 relays WebRTC offers, answers and ICE candidates between the two members of \
                 each room over a WebSocket. When a partner leaves, the remaining participant \
                 is re-matched after a short delay."
)]
struct Args {
    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Boot the service, check it once and exit non-zero unless healthy
    #[arg(long)]
    health_check: bool,

    /// Log level: trace, debug, info, warn or error
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Address to bind
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// HTTP and WebSocket port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Milliseconds before a participant whose partner left is re-matched
    #[arg(long, value_name = "MS")]
    rematch_delay_ms: Option<u64>,

    /// Shorthand for `--log-level debug`
    #[arg(short, long)]
    debug: bool,

    /// Validate configuration, print it and exit
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    /// Resolve the configuration source and apply command line overrides
    fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => AppConfig::from_env()?,
        };

        if self.debug {
            config.service.log_level = "debug".to_string();
        } else if let Some(level) = &self.log_level {
            config.service.log_level = level.clone();
        }
        if let Some(host) = &self.host {
            config.service.host = host.clone();
        }
        if let Some(port) = self.port {
            config.service.http_port = port;
        }
        if let Some(delay) = self.rematch_delay_ms {
            config.matchmaking.rematch_delay_ms = delay;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log filter '{}'", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing subscriber already installed: {}", e))
}

fn log_configuration(config: &AppConfig) {
    info!("🚀 {} v{}", config.service.name, pairline::VERSION);
    info!("   Bind address: {}", config.bind_address());
    info!("   Log filter: {}", config.service.log_level);
    info!("   Re-match delay: {}ms", config.matchmaking.rematch_delay_ms);
    info!("   CORS origin: {}", config.http.cors_origin);
    if config.http.rate_limit_enabled() {
        info!(
            "   API limit: {} requests per {}s per address",
            config.http.api_rate_limit, config.http.api_rate_window_seconds
        );
    }
    info!(
        "   ICE servers: {} ({})",
        config.signaling.ice_servers().len(),
        if config.signaling.turn.is_some() {
            "with TURN"
        } else {
            "STUN only"
        }
    );
}

/// Start the service, check it once and report
async fn check_once(config: AppConfig) -> Result<ExitCode> {
    let mut app_state = AppState::new(config).await?;
    app_state.start().await?;

    let manager = app_state.session_manager();
    let is_running = app_state.running_flag();
    let outcome = HealthCheck::check(
        &app_state.config().service.name,
        &manager,
        &is_running,
        app_state.started_at(),
    )
    .await;

    if let Err(e) = app_state.shutdown().await {
        warn!("Shutdown after health check failed: {}", e);
    }

    let health = outcome?;
    println!("{} {}", health.service, health.status);
    for check in &health.checks {
        println!("  {:<16} {}", check.name, check.status);
    }
    println!(
        "  connected={} rooms={} waiting={}",
        health.stats.connected, health.stats.active_rooms, health.stats.waiting_total
    );

    Ok(if health.status == HealthStatus::Healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("SIGINT received"),
            Err(e) => {
                error!("Cannot listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("SIGTERM received");
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let shutdown_timeout = config.shutdown_timeout();

    let mut app_state = AppState::new(config).await?;
    app_state.start().await?;
    info!("✅ Accepting connections, Ctrl+C to stop");

    shutdown_signal().await;
    info!("🛑 Draining connections...");

    match tokio::time::timeout(shutdown_timeout, app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Stopped cleanly"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!(
            "⚠️  Shutdown exceeded {}s, exiting anyway",
            shutdown_timeout.as_secs()
        ),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(&config.service.log_level) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    if args.dry_run {
        log_configuration(&config);
        info!("Configuration is valid, not starting (dry run)");
        return ExitCode::SUCCESS;
    }

    if args.health_check {
        return match check_once(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Health check failed: {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    log_configuration(&config);
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Service failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
