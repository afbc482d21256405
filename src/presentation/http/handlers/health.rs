//! Health Check Handlers
//!
//! - `GET /health`, `GET /health/live`: the process is up
//! - `GET /health/ready`: the database answers and the hub loop is serving queries

use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, Json};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::infrastructure::database;
use crate::startup::AppState;

static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Upper bound on each readiness check
const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Start the uptime clock (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
}

#[derive(Debug, Serialize)]
pub struct Probe {
    pub status: &'static str,
    pub version: &'static str,
}

/// State of one dependency
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
}

#[derive(Debug, Serialize)]
pub struct DatabaseCheck {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HubCheck {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_connections: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: DatabaseCheck,
    pub hub: HubCheck,
}

impl ReadinessReport {
    fn status_code(&self) -> StatusCode {
        if self.ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn probe(status: &'static str) -> Json<Probe> {
    Json(Probe {
        status,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn health_check() -> Json<Probe> {
    probe("healthy")
}

pub async fn liveness() -> Json<Probe> {
    probe("alive")
}

/// 200 when both dependencies are up, 503 otherwise
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let (database, hub) = tokio::join!(check_database(&state), check_hub(&state));

    let report = ReadinessReport {
        ready: database.status == CheckStatus::Up && hub.status == CheckStatus::Up,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        database,
        hub,
    };

    if !report.ready {
        tracing::warn!(?report, "Readiness check failed");
    }

    (report.status_code(), Json(report))
}

async fn check_database(state: &AppState) -> DatabaseCheck {
    let start = Instant::now();
    let error = match tokio::time::timeout(CHECK_TIMEOUT, database::ping(&state.db)).await {
        Ok(Ok(())) => {
            return DatabaseCheck {
                status: CheckStatus::Up,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            }
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("no answer within {:?}", CHECK_TIMEOUT),
    };

    DatabaseCheck {
        status: CheckStatus::Down,
        latency_ms: None,
        error: Some(error),
    }
}

/// An answer to a registry query proves the hub loop is turning.
async fn check_hub(state: &AppState) -> HubCheck {
    match tokio::time::timeout(CHECK_TIMEOUT, state.hub.connection_count()).await {
        Ok(Ok(count)) => HubCheck {
            status: CheckStatus::Up,
            active_connections: Some(count),
        },
        _ => HubCheck {
            status: CheckStatus::Down,
            active_connections: None,
        },
    }
}
