use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod console;

#[tokio::main]
async fn main() -> Result<()> {
    // Usar RUST_LOG=debug para ver cada heartbeat
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(false)
        .init();

    info!("HeartSync v{}", env!("CARGO_PKG_VERSION"));

    match app::run().await {
        Ok(()) => {
            info!("HeartSync exited cleanly.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}
