//! Sweet Claw CLI
//!
//! One binary, three processes:
//!
//! - `sweet core` - orchestrator, HTTP API and event bus
//! - `sweet audio` - sound feedback subscriber
//! - `sweet indicator` - standalone LED subscriber

use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sweet_feedback::FeedbackPlayer;
use sweet_indicator::IndicatorDriver;
use sweet_orchestrator::{create_router, Config, CoreError};
use sweet_protocol::BusSubscriber;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Sweet Claw - claw machine coordination over an event bus
#[derive(Parser, Debug)]
#[command(name = "sweet")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: sweet.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the orchestrator: HTTP API, event bus and in-process indicator
    Core {
        /// Port for the HTTP API server
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,
    },

    /// Run the audio feedback subscriber
    Audio {
        /// Websocket URL of the event bus
        #[arg(long, value_name = "URL")]
        bus_url: Option<String>,

        /// Directory holding the sound files
        #[arg(long, value_name = "DIR")]
        sounds_dir: Option<PathBuf>,
    },

    /// Run the LED indicator as a bus subscriber
    Indicator {
        /// Websocket URL of the event bus
        #[arg(long, value_name = "URL")]
        bus_url: Option<String>,

        /// Never touch GPIO, only log pin changes
        #[arg(long)]
        simulate: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Exit status for a failed run: 2 for unusable configuration, 1 otherwise.
fn exit_status(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<CoreError>().is_some_and(CoreError::is_fatal) {
        2
    } else {
        1
    }
}

/// Loads configuration and runs the selected process.
async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Core { port, host } => run_core(config, port, host).await,
        Command::Audio {
            bus_url,
            sounds_dir,
        } => run_audio(config, bus_url, sounds_dir).await,
        Command::Indicator { bus_url, simulate } => run_indicator(config, bus_url, simulate).await,
    }
}

/// Runs the orchestrator until Ctrl+C, then clears the indicator.
async fn run_core(mut config: Config, port: Option<u16>, host: Option<String>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.core.port = port;
    }
    if let Some(host) = host {
        config.core.host = host;
    }
    config.validate()?;

    let state = sweet_orchestrator::bootstrap(&config).await?;
    let orchestrator = Arc::clone(&state.orchestrator);
    let heartbeat =
        orchestrator.spawn_heartbeat(Duration::from_millis(config.core.tick_interval_ms));

    let addr = format!("{}:{}", config.core.host, config.core.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    tracing::info!(%addr, layout_file = %config.core.layout_file.display(), "Core API running");

    let served = tokio::select! {
        result = axum::serve(listener, create_router(state)).into_future() => {
            result.map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))
        }
        () = shutdown_signal() => {
            tracing::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    heartbeat.abort();
    orchestrator.shutdown().await;
    served
}

/// Runs the audio feedback subscriber until Ctrl+C.
async fn run_audio(
    mut config: Config,
    bus_url: Option<String>,
    sounds_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(url) = bus_url {
        config.feedback.bus_url = url;
    }
    if let Some(dir) = sounds_dir {
        config.feedback.sounds_dir = dir;
    }
    config.validate()?;

    let feedback = &config.feedback;
    let backend = sweet_feedback::select_backend(feedback);
    tracing::info!(
        backend = backend.name(),
        bus = %feedback.bus_url,
        sounds = %feedback.sounds_dir.display(),
        "Audio feedback starting"
    );

    let player = FeedbackPlayer::from_config(feedback, backend);
    let (events, subscriber) = BusSubscriber::new(&feedback.bus_url)
        .with_reconnect_delay(Duration::from_millis(feedback.reconnect_ms))
        .spawn();

    sweet_feedback::run(player, events, shutdown_signal()).await;
    subscriber.abort();
    Ok(())
}

/// Runs the standalone indicator until Ctrl+C, then clears every LED.
async fn run_indicator(
    mut config: Config,
    bus_url: Option<String>,
    simulate: bool,
) -> anyhow::Result<()> {
    if simulate {
        config.indicator.simulate = Some(true);
    }
    if let Some(url) = bus_url {
        config.feedback.bus_url = url;
    }
    config.validate()?;

    let driver = IndicatorDriver::from_config(&config.indicator);
    driver.flush().await;
    tracing::info!(
        backend = driver.backend_name(),
        bus = %config.feedback.bus_url,
        "Indicator starting"
    );

    let (events, subscriber) = BusSubscriber::new(&config.feedback.bus_url)
        .with_reconnect_delay(Duration::from_millis(config.feedback.reconnect_ms))
        .spawn();

    sweet_indicator::run(driver, events, shutdown_signal()).await;
    subscriber.abort();
    Ok(())
}

/// Resolves on Ctrl+C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Ok(Config::load_from_file(path)?)
        }
        None => Ok(Config::load()?),
    }
}
