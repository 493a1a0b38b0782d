use boardsync_server::{ServerError, config::Config, run};
use clap::Parser;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "boardsync_server=info,boardsync_core=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("boardsync server v{} starting", env!("CARGO_PKG_VERSION"));
    run(config).await
}
