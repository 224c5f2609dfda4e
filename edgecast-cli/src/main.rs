use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use edgecast::gateway::media::RtpMediaEngine;
use edgecast::gateway::supervisor::StaticStatusProvider;
use edgecast::gateway::transport::WsTransport;
use edgecast::gateway::{
    Collaborators, ConfigOverrides, ConfigWatch, Gateway, GatewayConfig, LoggingCommandSink,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "edgecast", version, about = "Edge camera WebRTC gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the signaling server and serve viewers until interrupted.
    Run {
        /// TOML config file. Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override `signaling.server_url`.
        #[arg(long)]
        server_url: Option<String>,

        /// Override `signaling.camera_id`.
        #[arg(long)]
        camera_id: Option<String>,
    },

    /// Parse and validate a config file, then print the effective settings.
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            server_url,
            camera_id,
        } => {
            init_tracing();
            let overrides = ConfigOverrides {
                server_url,
                camera_id,
            };
            run(config, overrides).await
        }
        Commands::Check { config } => check(&config),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn check(path: &Path) -> Result<()> {
    let config = GatewayConfig::load(path)
        .with_context(|| format!("Invalid config {}", path.display()))?;

    println!("{}", "✅ Config is valid".green().bold());
    println!("   📡 Signaling: {}", config.signaling_url());
    println!(
        "   🎥 Ports:     {} viewers from {} (stride {})",
        config.ports.max_peers, config.ports.base_port, config.ports.stride
    );
    println!("   💓 Heartbeat: {} ms", config.heartbeat.interval_ms);
    if config.http.enabled {
        println!("   🌐 Status:    http://{}", config.http.listen);
    }
    Ok(())
}

async fn run(path: Option<PathBuf>, overrides: ConfigOverrides) -> Result<()> {
    println!("{}", "🚀 Starting edgecast gateway...".green().bold());

    let watch = match &path {
        Some(path) => ConfigWatch::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigWatch::new(GatewayConfig::default()),
    };
    let watch = Arc::new(
        watch
            .with_overrides(overrides)
            .context("Command line overrides produce an invalid config")?,
    );
    let config = watch.current();
    info!("Camera '{}' -> {}", config.signaling.camera_id, config.signaling_url());

    let gateway = Gateway::new(
        watch.subscribe(),
        Collaborators {
            transport: Arc::new(WsTransport::new()),
            engine: Arc::new(RtpMediaEngine::new(config.media.clone())),
            status: Arc::new(StaticStatusProvider::new(watch.subscribe())),
            commands: Arc::new(LoggingCommandSink),
        },
    );

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    if config.http.enabled {
        let api = gateway.status_api();
        let addr = config.http.listen;
        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = api.serve(addr, token).await {
                error!("Status API on {addr} failed: {e}");
            }
        }));
    }

    tasks.push(tokio::spawn(reload_on_hangup(
        Arc::clone(&watch),
        shutdown.clone(),
    )));

    let stop = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, shutting down"),
            Err(e) => error!("Cannot listen for Ctrl+C: {e}"),
        }
        stop.cancel();
    });

    gateway.run(shutdown.clone()).await;
    shutdown.cancel();

    for task in tasks {
        let _ = task.await;
    }

    println!("{}", "👋 Gateway stopped".cyan());
    Ok(())
}

#[cfg(unix)]
async fn reload_on_hangup(watch: Arc<ConfigWatch>, shutdown: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!("Config reload on SIGHUP unavailable: {e}");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                match watch.reload() {
                    Ok(true) => {}
                    Ok(false) => info!("SIGHUP: configuration unchanged"),
                    Err(e) => warn!("SIGHUP: keeping current configuration: {e}"),
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_watch: Arc<ConfigWatch>, shutdown: CancellationToken) {
    shutdown.cancelled().await;
}
