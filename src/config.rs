//! Server configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Everything is read once at process start into a typed `Config`; there is
//! no hot reload. Missing or unparseable values fall back to defaults so a
//! bare `cargo run` boots a working (memory-backed) server.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HISTORY_CAP: usize = 100;
pub const DEFAULT_SAVE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;
pub const DEFAULT_MALFORMED_LIMIT_PER_SEC: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP port the server binds.
    pub port: u16,
    /// Base URL of the external document store. `None` selects the
    /// in-memory store (documents do not survive restarts).
    pub store_url: Option<String>,
    /// Allowed client origins for CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Maximum history frames retained per room. At least 1.
    pub history_cap: usize,
    /// Interval between warm-save sweeps over dirty rooms.
    pub save_interval: Duration,
    /// Per-session outbound queue capacity. Overflow disconnects the session.
    pub outbound_queue: usize,
    /// Malformed messages per second per session before disconnect.
    pub malformed_limit_per_sec: usize,
}

impl Config {
    /// Build the server config from environment variables.
    ///
    /// - `PORT`: default 3000
    /// - `STORE_URL`: document store base URL (absent selects the memory store)
    /// - `ALLOWED_ORIGINS`: comma-separated origin list (absent allows any)
    /// - `HISTORY_CAP`: default 100, clamped to at least 1
    /// - `SAVE_INTERVAL_MS`: default 1000
    /// - `OUTBOUND_QUEUE`: default 256, clamped to at least 1
    /// - `MALFORMED_LIMIT_PER_SEC`: default 20, clamped to at least 1
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            store_url: std::env::var("STORE_URL").ok().filter(|v| !v.is_empty()),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
            history_cap: env_parse("HISTORY_CAP", DEFAULT_HISTORY_CAP).max(1),
            save_interval: Duration::from_millis(env_parse("SAVE_INTERVAL_MS", DEFAULT_SAVE_INTERVAL_MS)),
            outbound_queue: env_parse("OUTBOUND_QUEUE", DEFAULT_OUTBOUND_QUEUE).max(1),
            malformed_limit_per_sec: env_parse("MALFORMED_LIMIT_PER_SEC", DEFAULT_MALFORMED_LIMIT_PER_SEC).max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store_url: None,
            allowed_origins: Vec::new(),
            history_cap: DEFAULT_HISTORY_CAP,
            save_interval: Duration::from_millis(DEFAULT_SAVE_INTERVAL_MS),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            malformed_limit_per_sec: DEFAULT_MALFORMED_LIMIT_PER_SEC,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
