//! In-memory rate limiting for malformed client traffic.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<Uuid, VecDeque<Instant>>`.
//! Only malformed messages are recorded; a session that sustains more than
//! the configured count per second is disconnected by the websocket layer.
//! Well-formed traffic (including high-frequency cursor moves) never counts
//! against the window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

const WINDOW: Duration = Duration::from_secs(1);

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("malformed-message limit exceeded (max {limit} per second)")]
    Exceeded { limit: usize },
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    limit: usize,
}

struct RateLimiterInner {
    /// Per-session malformed-message timestamps.
    offenses: HashMap<Uuid, VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner { offenses: HashMap::new() })),
            limit: limit.max(1),
        }
    }

    /// Record one malformed message and check the session's window.
    ///
    /// # Errors
    ///
    /// Returns `Exceeded` when the session has already used up its window.
    pub fn record_offense(&self, session_id: Uuid) -> Result<(), RateLimitError> {
        self.record_offense_at(session_id, Instant::now())
    }

    /// Internal: record + check with explicit timestamp (for testing).
    fn record_offense_at(&self, session_id: Uuid, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self.inner.lock().unwrap();
        let deque = inner.offenses.entry(session_id).or_default();
        prune_window(deque, now, WINDOW);
        if deque.len() >= self.limit {
            return Err(RateLimitError::Exceeded { limit: self.limit });
        }
        deque.push_back(now);
        Ok(())
    }

    /// Drop a session's window on disconnect.
    pub fn forget(&self, session_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.offenses.remove(&session_id);
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit() {
        let rl = RateLimiter::new(5);
        let session = Uuid::new_v4();
        let now = Instant::now();

        for i in 0..5 {
            assert!(rl.record_offense_at(session, now).is_ok(), "offense {i} should pass");
        }
        assert!(matches!(
            rl.record_offense_at(session, now),
            Err(RateLimitError::Exceeded { limit: 5 })
        ));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let rl = RateLimiter::new(3);
        let session = Uuid::new_v4();
        let start = Instant::now();

        for _ in 0..3 {
            rl.record_offense_at(session, start).unwrap();
        }
        assert!(rl.record_offense_at(session, start).is_err());

        let later = start + WINDOW + Duration::from_millis(1);
        assert!(rl.record_offense_at(session, later).is_ok());
    }

    #[test]
    fn distinct_sessions_do_not_interfere() {
        let rl = RateLimiter::new(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = Instant::now();

        rl.record_offense_at(a, now).unwrap();
        rl.record_offense_at(a, now).unwrap();
        assert!(rl.record_offense_at(a, now).is_err());
        assert!(rl.record_offense_at(b, now).is_ok());
    }

    #[test]
    fn forget_clears_the_window() {
        let rl = RateLimiter::new(1);
        let session = Uuid::new_v4();
        let now = Instant::now();

        rl.record_offense_at(session, now).unwrap();
        assert!(rl.record_offense_at(session, now).is_err());

        rl.forget(session);
        assert!(rl.record_offense_at(session, now).is_ok());
    }

    #[test]
    fn zero_limit_is_clamped_to_one() {
        let rl = RateLimiter::new(0);
        let session = Uuid::new_v4();
        let now = Instant::now();
        assert!(rl.record_offense_at(session, now).is_ok());
        assert!(rl.record_offense_at(session, now).is_err());
    }
}
