//! mqrelay - MQTT broker-to-broker message relay
//!
//! Usage:
//!   mqrelay [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>        Configuration file path
//!   --source-address <ADDR>    Source broker address (host:port)
//!   --target-address <ADDR>    Target broker address (host:port)
//!   --topic-prefix <PREFIX>    Prefix prepended to relayed topics
//!   -l, --log-level            Log level (error, warn, info, debug, trace)
//!   -h, --help                 Print help

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use mqrelay::config::Config;
use mqrelay::relay::{EndpointRole, ForwardingEngine, RelayEvent};

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    #[default]
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// mqrelay - MQTT broker-to-broker message relay
#[derive(Parser, Debug)]
#[command(name = "mqrelay")]
#[command(version = "0.1.0")]
#[command(about = "Relay MQTT messages from a source broker to a target broker")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source broker address (host:port)
    #[arg(long)]
    source_address: Option<String>,

    /// Target broker address (host:port)
    #[arg(long)]
    target_address: Option<String>,

    /// Prefix prepended to every relayed topic
    #[arg(long)]
    topic_prefix: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration file if specified, otherwise env vars + defaults
    let mut config = {
        let loaded = if let Some(config_path) = &args.config {
            Config::load(config_path)
        } else {
            Config::from_env()
        };
        match loaded {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    // CLI args override file config
    if let Some(address) = args.source_address {
        config.source.address = address;
    }
    if let Some(address) = args.target_address {
        config.target.address = address;
    }
    if let Some(prefix) = args.topic_prefix {
        config.route.topic_prefix = Some(prefix);
    }
    if let Err(e) = config.validate() {
        eprintln!("Error loading configuration: {}", e);
        std::process::exit(1);
    }

    // Setup logging - CLI overrides config, config overrides default (info)
    let log_level = args.log_level.unwrap_or_else(|| {
        match config.log.level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    info!("Starting mqrelay");
    info!("  Source broker: {}", config.source.address);
    info!("  Target broker: {}", config.target.address);
    info!("  Topics: {}", config.source.topics.join(", "));
    if let Some(prefix) = &config.route.topic_prefix {
        info!("  Topic prefix: {}", prefix);
    } else if !config.route.topic_mapping.is_empty() {
        info!(
            "  Topic mapping: {} entries",
            config.route.topic_mapping.len()
        );
    } else {
        info!("  Topic routing: pass-through");
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut engine = ForwardingEngine::new(&config, event_tx);

    // Relay health observer, decoupled from the engine itself
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                RelayEvent::ReconnectExhausted { endpoint } => match endpoint {
                    EndpointRole::Source => {
                        warn!("Source endpoint gave up reconnecting, no more messages will arrive")
                    }
                    EndpointRole::Target => {
                        warn!("Target endpoint gave up reconnecting, all messages will be dropped")
                    }
                },
                other => debug!("Relay event: {:?}", other),
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if let Err(e) = engine.start().await {
        error!("Failed to start relay: {}", e);
        std::process::exit(1);
    }

    engine.run(shutdown_rx).await?;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
