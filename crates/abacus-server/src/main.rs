//! Abacus Server - Entry point
//!
//! This is the main binary for the Abacus scoring API server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use abacus_server::config::AppConfig;
use abacus_server::logging::init_logging;
use abacus_server::{ApiServer, Dispatcher};
use abacus_store::{MemoryBackend, Store};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,

    /// Listen address override.
    addr: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;
        let mut addr = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--addr" | "-a" => {
                    addr = args.next();
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("abacus-server {}", abacus_server::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config, addr }
    }
}

fn print_help() {
    println!(
        r"Abacus Server - HTTP scoring API

USAGE:
    abacus-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -a, --addr <ADDR>      Listen address, overrides the configured one
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    ABACUS_HTTP_ADDR                Listen address (default: 0.0.0.0:8080)
    ABACUS_SHUTDOWN_TIMEOUT         Graceful shutdown timeout in seconds (default: 30)
    ABACUS_REQUEST_TIMEOUT          Request body timeout in seconds (default: 30)
    ABACUS_LOG_LEVEL                Log level filter (default: info)
    ABACUS_LOG_FORMAT               Log format, json or pretty (default: json)
    ABACUS_STORE_MAX_CACHE_ENTRIES  Cached records buffered before a flush (default: 64)
    ABACUS_STORE_MAX_RETRIES        Store read attempts before a miss (default: 3)

EXAMPLES:
    # Run with configuration file
    abacus-server --config /etc/abacus/server.toml

    # Run with environment variables
    ABACUS_HTTP_ADDR=0.0.0.0:9090 ABACUS_LOG_LEVEL=debug abacus-server
"
    );
}

#[tokio::main]
async fn main() {
    // Parse arguments
    let args = Args::parse();

    // Load configuration; logging is not up yet, report to stderr
    let mut config = match args.config {
        Some(path) => match AppConfig::from_file(&path) {
            Ok(config) => config.with_env_overrides(),
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                std::process::exit(1);
            }
        },
        None => AppConfig::default().with_env_overrides(),
    };

    if let Some(addr) = args.addr {
        config.server.http_addr = addr;
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // Initialize logging
    if let Err(e) = init_logging(&config.log_config()) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!("Starting Abacus server v{}", abacus_server::VERSION);
    info!("Listening on {}", config.server.http_addr);

    // Create and run server
    let store = Arc::new(Store::new(
        Arc::new(MemoryBackend::new()),
        config.store_config(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(store));
    let server = ApiServer::new(config.server_config(), dispatcher);

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
