//! oidc-keytool entry point.

#![forbid(unsafe_code)]

use clap::Parser;
use oidc_cli::{ToolConfig, cli::Cli, commands, output::error};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ToolConfig::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            error(&format!("Failed to load configuration: {e}"));
            std::process::exit(1);
        }
    };

    let level = if cli.verbose { "debug" } else { config.server.log_level.as_str() };
    if let Err(e) = oidc_core::logging::init_tracing(level) {
        error(&format!("Failed to initialize logging: {e}"));
    }

    if let Err(e) = commands::run(cli, &config).await {
        error(&e.to_string());
        std::process::exit(1);
    }
}
