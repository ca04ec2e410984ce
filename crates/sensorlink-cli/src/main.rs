//! Command-line interface for sensorlink.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sensorlink_client::ClientConfig;

mod commands;

/// Environment variable switching log output to JSON.
const LOG_JSON_ENV: &str = "SENSORLINK_LOG_JSON";

/// sensorlink - Self-describing sensor data over MQTT.
#[derive(Parser, Debug)]
#[command(name = "sensorlink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Client configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// MQTT broker host.
    #[arg(long, global = true)]
    host: Option<String>,

    /// MQTT broker port.
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Topic prefix of all sensor topics.
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print data from sensors as it arrives.
    Watch {
        /// Sensors to watch (all sensors when empty).
        names: Vec<String>,
        /// Print one JSON object per packet.
        #[arg(long)]
        json: bool,
    },
    /// Create a random test sensor and publish data for it.
    PublishRandom {
        /// Sensor name.
        #[arg(short, long, default_value = "rand")]
        name: String,
        /// Milliseconds between packets.
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many packets (0 = run forever).
        #[arg(long, default_value_t = 0)]
        count: u64,
    },
    /// Record every discovered sensor to record files.
    Record {
        /// Base directory name; a numbered suffix is always added.
        #[arg(short, long, default_value = "logs")]
        dir: PathBuf,
    },
    /// Decode a record file and print its packets as JSON.
    Dump {
        /// Path to the record file.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Run the offline encoding demo.
    Demo,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    // Check if JSON logging is requested (for production/container environments)
    let json_logging = std::env::var(LOG_JSON_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Resolve the client configuration: file, then environment, then flags.
fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    config.apply_env()?;

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(prefix) = &args.prefix {
        config.topic_prefix = prefix.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match &args.command {
        Command::Watch { names, json } => {
            commands::watch::run(load_config(&args)?, names, *json).await
        }
        Command::PublishRandom {
            name,
            interval_ms,
            count,
        } => commands::publish::run(load_config(&args)?, name, *interval_ms, *count).await,
        Command::Record { dir } => commands::record::run(load_config(&args)?, dir).await,
        Command::Dump { file } => commands::dump::run(file),
        Command::Demo => commands::demo::run(),
    }
}
