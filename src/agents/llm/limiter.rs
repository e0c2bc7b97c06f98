//! Per-provider fixed-window admission control

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::agents::config::ProviderKind;

/// Length of one rate-limit window in milliseconds
pub const WINDOW_LENGTH_MS: i64 = 60_000;

fn window_length() -> Duration {
    Duration::milliseconds(WINDOW_LENGTH_MS)
}

/// Source of the current time, swappable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
struct Window {
    request_count: u32,
    window_reset_at: DateTime<Utc>,
    limit: u32,
}

/// Point-in-time view of one provider's window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    pub request_count: u32,
    pub limit: u32,
    pub window_reset_at: DateTime<Utc>,
}

/// Fixed-window request counter with independent state per provider.
///
/// This is an admission test, not a scheduler: a denied check returns
/// immediately and leaves the window untouched.
pub struct RateLimiter {
    windows: HashMap<ProviderKind, Mutex<Window>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter with the given per-window limits
    pub fn new(limits: impl IntoIterator<Item = (ProviderKind, u32)>) -> Self {
        Self::with_clock(limits, Arc::new(SystemClock))
    }

    pub fn with_clock(
        limits: impl IntoIterator<Item = (ProviderKind, u32)>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let windows = limits
            .into_iter()
            .map(|(provider, limit)| {
                (
                    provider,
                    Mutex::new(Window {
                        request_count: 0,
                        window_reset_at: now + window_length(),
                        limit: limit.max(1),
                    }),
                )
            })
            .collect();

        Self { windows, clock }
    }

    /// Reserve one request slot for `provider`.
    ///
    /// Expired windows are reset before evaluating. Returns `true` and
    /// increments the count iff the count is below the limit; a `false`
    /// return consumes nothing. Unconfigured providers are always denied.
    pub fn check_and_reserve(&self, provider: ProviderKind) -> bool {
        let Some(window) = self.windows.get(&provider) else {
            tracing::debug!(%provider, "Rate limit check for unconfigured provider");
            return false;
        };

        let now = self.clock.now();
        let mut window = window.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if now > window.window_reset_at {
            window.request_count = 0;
            window.window_reset_at = now + window_length();
        }

        if window.request_count < window.limit {
            window.request_count += 1;
            true
        } else {
            false
        }
    }

    /// Time until the current window for `provider` resets
    pub fn retry_after(&self, provider: ProviderKind) -> std::time::Duration {
        self.snapshot(provider)
            .and_then(|s| (s.window_reset_at - self.clock.now()).to_std().ok())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, provider: ProviderKind) -> Option<WindowSnapshot> {
        self.windows.get(&provider).map(|window| {
            let window = window.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            WindowSnapshot {
                request_count: window.request_count,
                limit: window.limit,
                window_reset_at: window.window_reset_at,
            }
        })
    }
}
