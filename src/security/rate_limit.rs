//! Fixed-window rate limiting.
//!
//! Each client identity owns a counter and the instant its current window
//! opened. Once `window` has elapsed the counter starts again from zero, so a
//! request landing exactly on the boundary belongs to the new window.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::{RateLimitConfig, RateLimitKey};

/// Bucket name used when every caller shares one window.
pub const GLOBAL_CLIENT: &str = "global";

/// Time source for the limiter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic process clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Counter state for one client.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Limiter state reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Capacity of a window.
    pub limit: u32,
    /// Requests still admissible in the current window.
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
    /// Length of a window.
    pub window: Duration,
}

/// Outcome of [`FixedWindowLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed(RateLimitStatus),
    Rejected(RateLimitStatus),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed(_))
    }

    pub fn status(&self) -> RateLimitStatus {
        match self {
            Admission::Allowed(s) | Admission::Rejected(s) => *s,
        }
    }
}

/// Per-client fixed-window limiter.
pub struct FixedWindowLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self::with_clock(window, max_requests, Arc::new(SystemClock))
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_requests)
    }

    pub fn with_clock(window: Duration, max_requests: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
            clock,
        }
    }

    /// Count one request for `client` and decide whether it may proceed.
    ///
    /// The DashMap entry guard serializes concurrent arrivals for the same
    /// client, so the counter is never undercounted.
    pub fn admit(&self, client: &str) -> Admission {
        let now = self.clock.now();
        let mut entry = self
            .windows
            .entry(client.to_string())
            .or_insert(Window { count: 0, started: now });
        let window = entry.value_mut();

        if now.saturating_duration_since(window.started) >= self.window {
            window.count = 0;
            window.started = now;
        }

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(window.started));

        if window.count >= self.max_requests {
            return Admission::Rejected(RateLimitStatus {
                limit: self.max_requests,
                remaining: 0,
                reset_after,
                window: self.window,
            });
        }

        window.count += 1;
        Admission::Allowed(RateLimitStatus {
            limit: self.max_requests,
            remaining: self.max_requests - window.count,
            reset_after,
            window: self.window,
        })
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Derive the rate-limit identity of a caller.
pub fn client_identity(key_by: RateLimitKey, peer: SocketAddr) -> String {
    match key_by {
        RateLimitKey::PeerIp => peer.ip().to_string(),
        RateLimitKey::Global => GLOBAL_CLIENT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ManualClock(Mutex<Instant>);

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Instant::now())))
        }

        fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    #[test]
    fn test_thirty_first_request_is_rejected() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 30);
        for i in 0..30 {
            assert!(limiter.admit("10.0.0.1").is_allowed(), "request {} rejected", i + 1);
        }
        let last = limiter.admit("10.0.0.1");
        assert!(!last.is_allowed());
        assert_eq!(last.status().remaining, 0);
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 3);
        assert_eq!(limiter.admit("a").status().remaining, 2);
        assert_eq!(limiter.admit("a").status().remaining, 1);
        assert_eq!(limiter.admit("a").status().remaining, 0);
    }

    #[test]
    fn test_clients_are_isolated() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.admit("a").is_allowed());
        assert!(!limiter.admit("a").is_allowed());
        assert!(limiter.admit("b").is_allowed());
    }

    #[test]
    fn test_boundary_request_counts_against_new_window() {
        let clock = ManualClock::new();
        let limiter = FixedWindowLimiter::with_clock(Duration::from_secs(60), 2, clock.clone());

        assert!(limiter.admit("a").is_allowed());
        assert!(limiter.admit("a").is_allowed());
        assert!(!limiter.admit("a").is_allowed());

        clock.advance(Duration::from_secs(59));
        assert!(!limiter.admit("a").is_allowed());

        clock.advance(Duration::from_secs(1));
        let at_boundary = limiter.admit("a");
        assert!(at_boundary.is_allowed());
        assert_eq!(at_boundary.status().remaining, 1);
        assert_eq!(at_boundary.status().reset_after, Duration::from_secs(60));
    }

    #[test]
    fn test_reset_after_shrinks_within_window() {
        let clock = ManualClock::new();
        let limiter = FixedWindowLimiter::with_clock(Duration::from_secs(60), 5, clock.clone());

        limiter.admit("a");
        clock.advance(Duration::from_secs(20));
        assert_eq!(limiter.admit("a").status().reset_after, Duration::from_secs(40));
    }

    #[test]
    fn test_purge_expired() {
        let clock = ManualClock::new();
        let limiter = FixedWindowLimiter::with_clock(Duration::from_secs(60), 5, clock.clone());

        limiter.admit("old");
        clock.advance(Duration::from_secs(30));
        limiter.admit("new");
        clock.advance(Duration::from_secs(30));

        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_admits_are_not_undercounted() {
        let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(60), 100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..50).filter(|_| limiter.admit("shared").is_allowed()).count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
    }

    #[test]
    fn test_client_identity() {
        let peer: SocketAddr = "192.168.1.7:40000".parse().unwrap();
        assert_eq!(client_identity(RateLimitKey::PeerIp, peer), "192.168.1.7");
        assert_eq!(client_identity(RateLimitKey::Global, peer), GLOBAL_CLIENT);
    }
}
