//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Three endpoints: the websocket upgrade for realtime sessions, a health
//! probe, and the delete notification the document-store collaborator posts
//! when a whiteboard record is destroyed. CORS is permissive unless
//! origins are configured.

pub mod ws;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::config::Config;
use crate::services::registry;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route("/api/rooms/{room_id}/deleted", post(room_deleted))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring unparseable allowed origin");
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(serde::Serialize)]
struct Health {
    status: &'static str,
    connections: usize,
    rooms: usize,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        connections: state.connections.load(std::sync::atomic::Ordering::Relaxed),
        rooms: registry::room_count(&state).await,
    })
}

/// Delete notification from the document store: the whiteboard record is
/// gone, so drop the live room and tell its members.
async fn room_deleted(State(state): State<AppState>, Path(room_id): Path<String>) -> StatusCode {
    if registry::delete(&state, &room_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
