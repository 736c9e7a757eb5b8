//! Relay server binary.
//!
//! Loads `RelayConfig` from an optional TOML file, applies `GAME_RELAY_*`
//! environment overrides and command-line flags, then runs until Ctrl+C.

use std::process::ExitCode;

use tracing::{error, info};

use game_relay::config::RelayConfig;
use game_relay::transport::start_server;
use game_relay::utils::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match parse_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate_strict() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    info!(
        app = %config.logging.app_name,
        address = %config.server.address,
        discovery = config.discovery.enabled,
        "Starting relay"
    );

    match start_server(config).await {
        Ok(()) => {
            info!("Relay stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Relay failed");
            ExitCode::FAILURE
        }
    }
}

/// Build the config: file (if given), then environment, then flags.
fn parse_args() -> Result<RelayConfig, String> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<String> = None;
    let mut port: Option<u16> = None;
    let mut name: Option<String> = None;
    let mut no_discovery = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                config_path = Some(
                    args.get(i)
                        .cloned()
                        .ok_or("--config requires a file path")?,
                );
            }
            "--port" => {
                i += 1;
                port = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .ok_or("--port requires a valid port number")?,
                );
            }
            "--name" => {
                i += 1;
                name = Some(args.get(i).cloned().ok_or("--name requires a value")?);
            }
            "--no-discovery" => no_discovery = true,
            "--print-config" => {
                print!("{}", RelayConfig::example_config());
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => {
            let mut config = RelayConfig::from_file(&path).map_err(|e| e.to_string())?;
            config.apply_env();
            config
        }
        None => RelayConfig::from_env(),
    };

    if let Some(port) = port {
        config.server.address = format!("0.0.0.0:{port}");
    }
    if let Some(name) = name {
        config.discovery.server_name = name;
    }
    if no_discovery {
        config.discovery.enabled = false;
    }

    Ok(config)
}

fn print_usage() {
    println!("Usage: relay [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config, -c <FILE>   TOML configuration file");
    println!("  --port <PORT>         Game port (default: 8080)");
    println!("  --name <NAME>         Name advertised to LAN clients");
    println!("  --no-discovery        Do not broadcast discovery announcements");
    println!("  --print-config        Print an example configuration and exit");
    println!("  --help, -h            Show this help");
    println!();
    println!("Environment overrides use the GAME_RELAY_ prefix, e.g. GAME_RELAY_ADDRESS.");
}
