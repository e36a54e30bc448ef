//! Backend service configuration checker.
//!
//! Loads a backend service file, runs the same validation the dispatcher
//! relies on, and prints what the dispatcher would see.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

use backend_dispatch::config::loader::load_backend_service;
use backend_dispatch::observability::logging::{init_logging, LogFormat, LoggingConfig};
use backend_dispatch::BackendServiceConfig;

#[derive(Parser)]
#[command(name = "backend-dispatch")]
#[command(about = "Inspect backend service configuration for the request dispatcher", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(short, long, default_value = "backend_dispatch=info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a backend service file and print a summary
    Check {
        /// Path to the backend service TOML file
        path: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_output = matches!(cli.command, Commands::Check { json: true, .. });

    init_logging(&LoggingConfig {
        level: cli.log_level,
        format: if json_output { LogFormat::Json } else { LogFormat::Pretty },
    });

    match cli.command {
        Commands::Check { path, json } => match load_backend_service(&path) {
            Ok(config) => {
                if json {
                    println!("{}", summary_json(&config));
                } else {
                    print_summary(&config);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Invalid backend service");
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn summary_json(config: &BackendServiceConfig) -> serde_json::Value {
    json!({
        "id": config.id(),
        "path": config.path(),
        "protocol": config.protocol().to_string(),
        "response_timeout_millis": config.response_timeout().as_millis() as u64,
        "health_check": config.health_check().is_some(),
        "sticky_session": config.sticky_session(),
        "origins": config.origins(),
        "rewrites": config.rewrites(),
    })
}

fn print_summary(config: &BackendServiceConfig) {
    println!("Application:      {}", config.id());
    println!("Path:             {}", config.path());
    println!("Protocol:         {}", config.protocol());
    println!("Response timeout: {}ms", config.response_timeout().as_millis());
    println!(
        "Health check:     {}",
        if config.health_check().is_some() { "enabled" } else { "disabled" }
    );
    println!(
        "Sticky sessions:  {}",
        if config.sticky_session().enabled { "enabled" } else { "disabled" }
    );
    println!("Rewrites:         {}", config.rewrites().len());
    println!("Origins:");
    for origin in config.origins() {
        println!("  {} -> {}", origin.id, origin.host_and_port());
    }
}
