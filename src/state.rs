//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the live-room map, the document store handle, the parsed config,
//! and the gauges the health endpoint reports. The room map lock is held
//! only for lookup and insert; room operations run under each room's own
//! lock (see `services::registry`).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::services::room::Room;
use crate::services::store::DocumentStore;

/// Shared application state. Clone is required by Axum — all inner fields
/// are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    /// Live rooms keyed by room id. Lock covers lookup/insert only.
    pub rooms: Arc<RwLock<HashMap<String, Arc<Room>>>>,
    /// Malformed-traffic limiter shared across sessions.
    pub rate_limiter: RateLimiter,
    /// Open websocket connections, for the health endpoint.
    pub connections: Arc<AtomicUsize>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let rate_limiter = RateLimiter::new(config.malformed_limit_per_sec);
        Self {
            config: Arc::new(config),
            store,
            rooms: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
