mod audio;
mod commands;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sholat_core::{CoreError, SholatConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(version, about = "Prayer times and adzan countdown")]
struct Cli {
    /// Use this config file instead of ~/.config/sholat/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live countdown to the next prayer, announcing each adzan
    Watch {
        /// City ID, overrides location.city_id
        #[arg(short, long)]
        city: Option<String>,
        /// Do not ring or play audio
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the prayer schedule for one day
    Schedule {
        #[arg(short, long)]
        city: Option<String>,
        /// Date as YYYY-MM-DD, defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// List cities, optionally filtered by name
    Cities { query: Option<String> },
    /// Show a random Quran verse
    Ayat,
    /// Show a random hadith
    Hadith,
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(SholatConfig::config_path);

    init_tracing(check_file_logging_enabled(&config_path));

    let config = match SholatConfig::load_or_create_at(&config_path) {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            println!("Created a new config file at {}", path.display());
            println!("Set location.city_id (find it with `sholat cities <name>`) and run again.");
            // Listing cities does not need a configured location
            if matches!(cli.command, Commands::Cities { .. }) {
                SholatConfig::default()
            } else {
                std::process::exit(0);
            }
        }
        Err(e) => {
            error!("Failed to load {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli.command, &config)) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &SholatConfig) -> anyhow::Result<()> {
    match command {
        Commands::Watch { city, quiet } => {
            let city_id = config.city_id(city.as_deref())?;

            let cancel_token = CancellationToken::new();
            let ctrlc_token = cancel_token.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                info!("Received Ctrl+C, shutting down gracefully...");
                ctrlc_token.cancel();
            }) {
                error!("Failed to set Ctrl+C handler: {}", e);
            }

            commands::watch(config, city_id, quiet, cancel_token).await
        }
        Commands::Schedule { city, date } => {
            let city_id = config.city_id(city.as_deref())?;
            commands::schedule(config, city_id, date).await
        }
        Commands::Cities { query } => commands::cities(config, query.as_deref()).await,
        Commands::Ayat => commands::ayat(config).await,
        Commands::Hadith => commands::hadith(config).await,
    }
}

/// Read only `[logging] enabled` so tracing is up before the full config load.
fn check_file_logging_enabled(config_path: &std::path::Path) -> bool {
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing on stderr with optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,sholat=info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = sholat_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
