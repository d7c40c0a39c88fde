use std::net::SocketAddr;

use tracing::info;

use nosh_api::telemetry::{self, LogSettings};
use nosh_api::{router, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_settings = LogSettings::from_env();
    let _log_guard = telemetry::init_tracing(&log_settings);
    info!(
        log_format = ?log_settings.format,
        log_target = %log_settings.target(),
        "Logging initialized"
    );

    let config = AppConfig::from_env()?;
    let platform = nosh_platform::connect(config.supabase())?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(config, platform));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
