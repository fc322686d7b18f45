//! CLI argument definitions using clap.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gateway_config::{default_config_path, load_config_from, LogFormat};
use gateway_routing::TokenCounter;
use gateway_server::{AppState, PidFile, Server, ServerConfig};
use gateway_telemetry::{init_logging, shutdown_tracing, LoggingConfig};
use std::path::PathBuf;
use tracing::info;

/// Claude Router - serve the Claude Messages API from OpenAI-compatible providers
#[derive(Parser, Debug)]
#[command(name = "claude-router")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default `~/.claude-router/config.json`)
    #[arg(short, long, env = "CLAUDE_ROUTER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// PID file (default `~/.claude-router/.claude-router.pid`)
    #[arg(long, env = "CLAUDE_ROUTER_PID_FILE", global = true)]
    pub pid_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway in the foreground
    #[command(visible_alias = "run")]
    Start(StartArgs),

    /// Stop the running gateway
    Stop,

    /// Report whether the gateway is running
    Status,
}

/// Arguments for the start command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Host to bind to (overrides the config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Emit JSON logs
    #[arg(long)]
    pub json_logs: bool,

    /// Attach the OpenTelemetry tracing layer
    #[arg(long)]
    pub otel: bool,
}

impl Cli {
    /// Execute the selected command
    pub async fn execute(self) -> Result<()> {
        let pid_file = match self.pid_file {
            Some(path) => PidFile::new(path),
            None => PidFile::default_location().context("Cannot locate the PID file")?,
        };

        match self.command {
            Commands::Start(args) => start(self.config, pid_file, args).await,
            Commands::Stop => stop(&pid_file),
            Commands::Status => {
                status(&pid_file);
                Ok(())
            }
        }
    }
}

async fn start(config_path: Option<PathBuf>, pid_file: PidFile, args: StartArgs) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => default_config_path().context("Cannot locate the config file")?,
    };
    let mut config = load_config_from(&path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let logging = LoggingConfig::new()
        .with_level(&config.log_level)
        .with_json(args.json_logs || config.log_format == LogFormat::Json)
        .with_otel(args.otel);
    let tracer = init_logging(&logging).context("Failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Claude Router");

    TokenCounter::preload();
    pid_file.acquire()?;

    let result = run_server(config).await;

    pid_file.cleanup();
    shutdown_tracing(tracer);
    result
}

async fn run_server(config: gateway_config::GatewayConfig) -> Result<()> {
    let server_config = ServerConfig::from(&config);
    let state = AppState::from_config(config).context("Failed to build gateway state")?;
    Server::new(server_config, state)
        .run()
        .await
        .context("Server failed")
}

fn stop(pid_file: &PidFile) -> Result<()> {
    match pid_file.stop()? {
        Some(pid) => println!("Stopping claude-router (pid {pid})"),
        None => println!("claude-router is not running"),
    }
    Ok(())
}

fn status(pid_file: &PidFile) {
    match pid_file.running_pid() {
        Some(pid) => println!("claude-router is running (pid {pid})"),
        None => println!("claude-router is not running"),
    }
    println!("  pid file: {}", pid_file.path().display());
}
