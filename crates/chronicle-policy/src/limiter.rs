//! Fixed-window attempt counter keyed by client address.
//!
//! Used to throttle `auth.login_failed` records so an unauthenticated caller
//! cannot fill the log. Each key gets `max_attempts` within a window that
//! opens on its first attempt; the window resets once it has fully elapsed.
//!
//! Expired windows are swept at most once per window length, never on every
//! call. At most [`MAX_TRACKED_KEYS`] addresses are tracked individually;
//! once that many are live, unseen addresses share one overflow window.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::LoginFailureConfig;

/// Upper bound on individually tracked addresses.
pub const MAX_TRACKED_KEYS: usize = 10_000;

/// Shared window for addresses seen while the map is full.
const OVERFLOW_KEY: &str = "\0overflow";

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: DateTime<Utc>,
    attempts: u32,
}

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<String, Window>,
    last_pruned: Option<DateTime<Utc>>,
}

impl LimiterState {
    /// Drop windows that have fully elapsed, if a window length has passed
    /// since the previous sweep.
    fn prune_if_due(&mut self, now: DateTime<Utc>, window: Duration) {
        let Some(last) = self.last_pruned else {
            self.last_pruned = Some(now);
            return;
        };
        if now - last < window {
            return;
        }
        let before = self.windows.len();
        self.windows.retain(|_, w| now - w.opened_at < window);
        self.last_pruned = Some(now);
        debug!(
            removed = before - self.windows.len(),
            tracked = self.windows.len(),
            "pruned expired login windows"
        );
    }

    /// The map key that `key` counts against.
    fn slot<'a>(&self, key: &'a str) -> &'a str {
        if self.windows.contains_key(key) || self.windows.len() < MAX_TRACKED_KEYS {
            key
        } else {
            OVERFLOW_KEY
        }
    }
}

#[derive(Debug)]
pub struct LoginRateLimiter {
    max_attempts: u32,
    window: Duration,
    state: Mutex<LimiterState>,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            window,
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn from_config(config: &LoginFailureConfig) -> Self {
        let secs = i64::try_from(config.window_secs).unwrap_or(i64::MAX);
        let window = Duration::try_seconds(secs).unwrap_or(Duration::MAX);
        Self::new(config.max_attempts, window)
    }

    /// Count one attempt for `key` at `now`. Returns `false` once the key has
    /// used up its window.
    pub fn allow(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut state = self.lock();
        state.prune_if_due(now, self.window);

        let slot = state.slot(key);
        if slot == OVERFLOW_KEY && !state.windows.contains_key(OVERFLOW_KEY) {
            warn!(
                tracked = state.windows.len(),
                "login limiter full, new addresses share one window"
            );
        }

        let entry = state.windows.entry(slot.to_string()).or_insert(Window {
            opened_at: now,
            attempts: 0,
        });

        if now - entry.opened_at >= self.window {
            *entry = Window {
                opened_at: now,
                attempts: 0,
            };
        }

        if entry.attempts >= self.max_attempts {
            debug!(key = %key, attempts = entry.attempts, "login failure throttled");
            return false;
        }

        entry.attempts += 1;
        true
    }

    /// Give back one attempt previously granted to `key` by [`allow`].
    ///
    /// Used when the attempt could not be recorded.
    ///
    /// [`allow`]: LoginRateLimiter::allow
    pub fn release(&self, key: &str) {
        let mut state = self.lock();
        let slot = if state.windows.contains_key(key) {
            key
        } else {
            OVERFLOW_KEY
        };
        if let Some(entry) = state.windows.get_mut(slot) {
            entry.attempts = entry.attempts.saturating_sub(1);
        }
    }

    /// Number of windows currently held, the overflow window included.
    pub fn tracked_keys(&self) -> usize {
        self.lock().windows.len()
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // The state holds plain counters, so a poisoned lock is still usable.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("login rate limiter lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
