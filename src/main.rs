//! Web service entry point.
//!
//! ```text
//! load config → Orchestrator::start
//!     logger → store → cache → routes → listener
//! SIGINT/SIGTERM
//!     → stop accepting → drain (5s) → release cache, store → exit
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use web_scaffold::config::load_config;
use web_scaffold::lifecycle::{termination, Orchestrator};
use web_scaffold::resources::{MySqlConnector, RedisConnector};

#[derive(Parser)]
#[command(name = "web-scaffold")]
#[command(about = "Web service with graceful lifecycle", long_about = None)]
struct Cli {
    /// Configuration file (YAML or TOML).
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("init settings failed, error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = Orchestrator::new(config.clone())
        .with_config_path(cli.config.clone())
        .with_resource(MySqlConnector::new(config.store))
        .with_resource(RedisConnector::new(config.cache));

    match orchestrator.run(termination()).await {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "service stopped");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
