//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::infrastructure::database;
use crate::infrastructure::repositories::{PgChatMembers, PgMessageStore};
use crate::presentation::http::{handlers::health, routes};
use crate::presentation::middleware::{logging, Authenticator, JwtAuthenticator};
use crate::presentation::websocket::{Hub, HubHandle};

/// How long the hub gets to drain after the listener stops
const HUB_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub hub: HubHandle,
    pub authenticator: Arc<dyn Authenticator>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the hub to the Postgres collaborators and return the state
    /// together with the hub task.
    pub fn build(db: PgPool, settings: Settings) -> (Self, JoinHandle<()>) {
        let persistence = Arc::new(PgMessageStore::new(db.clone()));
        let members = Arc::new(PgChatMembers::new(db.clone()));
        let (hub, hub_task) = Hub::spawn(&settings.hub, persistence, members);

        let authenticator = Arc::new(JwtAuthenticator::new(&settings.jwt.secret));

        let state = Self {
            db,
            hub,
            authenticator,
            settings: Arc::new(settings),
        };

        (state, hub_task)
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    hub_task: JoinHandle<()>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        // Create database pool
        let db = database::create_pool(&settings.database)
            .await
            .context("failed to create database pool")?;
        tracing::info!("Database connection pool created");

        let addr = settings.server_addr();
        let (state, hub_task) = AppState::build(db, settings);
        tracing::info!(
            inbound_queue_capacity = state.settings.hub.inbound_queue_capacity,
            max_in_flight = state.settings.hub.max_in_flight,
            "Hub spawned"
        );

        // Build router with middleware
        let router = routes::create_router(state).layer(logging::create_trace_layer());

        // Bind to address
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            hub_task,
        })
    }

    /// Run the server until a shutdown signal arrives, then let the hub drain
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Listener closed, waiting for hub to drain");

        // Upgraded sockets keep hub handles alive past the listener.
        let abort = self.hub_task.abort_handle();
        match tokio::time::timeout(HUB_DRAIN_TIMEOUT, self.hub_task).await {
            Ok(Ok(())) => tracing::info!("Hub stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Hub task failed"),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = HUB_DRAIN_TIMEOUT.as_secs(),
                    "Hub did not drain in time, aborting"
                );
                abort.abort();
            }
        }

        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
