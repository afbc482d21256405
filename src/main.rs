//! # Chat Realtime
//!
//! Real-time chat delivery service.
//!
//! This is the application entry point that initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Database connection pool
//! - Fan-out hub
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use chat_realtime::config::Settings;
use chat_realtime::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration decides the log format, so it loads first
    let settings = Settings::load()?;

    chat_realtime::telemetry::init_tracing(settings.logging.format);

    info!("Starting Chat Realtime...");
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Server stopped");
    Ok(())
}
