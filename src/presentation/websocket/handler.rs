//! WebSocket Upgrade Handler
//!
//! Admits an already-authenticated caller as a hub connection.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    Extension,
};

use super::connection::Connection;
use crate::presentation::middleware::AuthUser;
use crate::startup::AppState;

/// WebSocket upgrade handler
///
/// Runs behind [`auth_middleware`](crate::presentation::middleware::auth_middleware),
/// so the user identity is known before the upgrade is accepted.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    let settings = state.settings.websocket.clone();
    let max_message_size = settings.max_message_size;
    let connection = Connection::new(user.user_id, state.hub.clone(), settings);

    tracing::debug!(
        user_id = user.user_id,
        connection_id = %connection.id(),
        "Upgrading WebSocket connection"
    );

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| connection.serve(socket))
}
