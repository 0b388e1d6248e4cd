//! Per-client fixed-window request limiter
//!
//! Each client IP gets `max_requests` per window. Counters live in process
//! memory and reset on restart. Outbound provider pacing uses `governor`
//! inside the API clients; this limiter only guards inbound requests.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use teed_common::config::RateLimitConfig;

/// Entries kept before expired windows are swept
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_requests: config.max_requests.max(1),
            window: Duration::from_secs(config.window_secs.max(1)),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request from `ip`
    ///
    /// Returns `Err(retry_after_secs)` when the client has used up its window.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        if !self.enabled {
            return Ok(());
        }

        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(ip).or_insert(Window { started: now, count: 0 });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count >= self.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(entry.started));
            // Round up so clients never retry inside the window
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            tracing::debug!(client = %ip, retry_after, "Rate limit exceeded");
            return Err(retry_after.max(1));
        }

        entry.count += 1;
        Ok(())
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}
