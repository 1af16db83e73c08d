use std::sync::Arc;

use clap::Parser;
use smcache::{
    cli::{self, describe_timeout, Cli},
    observability::{init_logging, log_config_info},
    secrets::backends::{GcpClientConfig, GcpClientFactory},
    APP_NAME, VERSION,
};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    init_logging(&cli.logging_config())?;

    if let Ok(config) = cli.cache_config() {
        log_config_info(&config);
        debug!(
            app_name = APP_NAME,
            version = VERSION,
            project_id = %config.project_id,
            operation_timeout = %describe_timeout(&config),
            "Starting smcache"
        );
    }

    let factory = GcpClientFactory::new(GcpClientConfig::from_env());
    let mut stdout = std::io::stdout().lock();

    if let Err(e) = cli::run(cli, Arc::new(factory), &mut stdout).await {
        error!(error = %format!("{:#}", e), "Command failed");
        return Err(e);
    }

    Ok(())
}
