//! Kyradi booking engine - CLI server
//!
//! ```sh
//! # Run with default config (~/.config/kyradi/config.toml)
//! kyradi-engine
//!
//! # Custom config path and port
//! kyradi-engine --config /etc/kyradi/config.toml --port 9100
//!
//! # Validate config without starting
//! kyradi-engine --check
//!
//! # Mint a key for the front desk of a hotel
//! kyradi-engine --generate-api-key "Hotel Kadikoy front desk"
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use kyradi_engine::config::AppConfig;
use kyradi_engine::infrastructure::crypto::generate_api_key;
use kyradi_engine::server::{init_tracing, ServerHandle, ServerOptions};

#[derive(Parser, Debug)]
#[command(
    name = "kyradi-engine",
    version,
    about = "Reservation, payment and settlement engine for hotel luggage storage",
    long_about = "Kyradi booking engine: REST API over the reservation ledger, \
                  payment gateway and settlement calculator.\n\n\
                  Default config: ~/.config/kyradi/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "KYRADI_CONFIG")]
    config: Option<PathBuf>,

    /// Override the API listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    /// Print a new API key and its config entry, then exit.
    #[arg(long, value_name = "NAME")]
    generate_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(name) = cli.generate_api_key {
        let generated = generate_api_key(&name);
        println!("API key (shown once): {}", generated.key);
        println!();
        println!("[[api_keys]]");
        println!("name = \"{}\"", name);
        println!("key_hash = \"{}\"", generated.key_hash);
        println!("# tenant_id = \"<tenant uuid>\"   # omit for a platform key");
        return Ok(());
    }

    let config_path = cli.config.unwrap_or_else(kyradi_engine::default_config_path);

    let mut config = match AppConfig::load_or_default(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if cli.check {
                eprintln!("Configuration is invalid: {}", e);
                std::process::exit(1);
            }
            return Err(e.into());
        }
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if cli.check {
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}", config.server.address());
        println!("   Database    : {}", config.database.url);
        println!("   API keys    : {}", config.api_keys.len());
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    init_tracing(&config);
    info!(path = %config_path.display(), "Configuration loaded");

    let handle = match ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to start");
            return Err(e);
        }
    };

    handle.install_signal_handler();
    info!("Press Ctrl+C to shut down gracefully");

    handle.shutdown_signal().notified().wait().await;
    handle.wait().await;

    Ok(())
}
