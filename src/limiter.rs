//! Sliding-window rate limiting for the embedding provider.
//!
//! Tracks two quantities over one window: request count and estimated
//! token volume. Callers pass the estimated token cost of each call;
//! entries older than the window are evicted lazily on every observation.
//! The limiter is shared across all products and sessions and serializes
//! its own mutation, so it is safe under concurrent use.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::RateLimitError;

/// Default window width.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Entry {
    at: Instant,
    tokens: u64,
}

/// Sliding-window counter gating requests-per-window and tokens-per-window.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    max_tokens: u64,
    entries: Mutex<VecDeque<Entry>>,
}

impl RateLimiter {
    /// Creates a limiter with the default 60 s window.
    #[must_use]
    pub fn new(max_requests: u32, max_tokens: u64) -> Self {
        Self::with_window(max_requests, max_tokens, DEFAULT_WINDOW)
    }

    /// Creates a limiter with a custom window.
    #[must_use]
    pub fn with_window(max_requests: u32, max_tokens: u64, window: Duration) -> Self {
        Self {
            window,
            max_requests,
            max_tokens,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Fails if admitting a call of `tokens` estimated tokens would exceed
    /// either ceiling. Does not record anything.
    ///
    /// # Errors
    ///
    /// Returns a [`RateLimitError`] carrying the seconds until the earliest
    /// window entry expires.
    pub fn check(&self, tokens: u64) -> Result<(), RateLimitError> {
        let mut entries = self.entries.lock();
        self.check_locked(&mut entries, tokens)
    }

    /// Records a call of `tokens` estimated tokens at the current instant.
    pub fn record(&self, tokens: u64) {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        Self::evict(&mut entries, now, self.window);
        entries.push_back(Entry { at: now, tokens });
    }

    /// Atomic check-then-record with respect to concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns a [`RateLimitError`] when either ceiling would be exceeded;
    /// nothing is recorded in that case.
    pub fn check_and_record(&self, tokens: u64) -> Result<(), RateLimitError> {
        let mut entries = self.entries.lock();
        self.check_locked(&mut entries, tokens)?;
        entries.push_back(Entry {
            at: Instant::now(),
            tokens,
        });
        Ok(())
    }

    /// Current request count within the window.
    #[must_use]
    pub fn current_requests(&self) -> usize {
        let mut entries = self.entries.lock();
        Self::evict(&mut entries, Instant::now(), self.window);
        entries.len()
    }

    /// Current token volume within the window.
    #[must_use]
    pub fn current_tokens(&self) -> u64 {
        let mut entries = self.entries.lock();
        Self::evict(&mut entries, Instant::now(), self.window);
        entries.iter().map(|e| e.tokens).sum()
    }

    fn check_locked(
        &self,
        entries: &mut VecDeque<Entry>,
        tokens: u64,
    ) -> Result<(), RateLimitError> {
        let now = Instant::now();
        Self::evict(entries, now, self.window);

        if entries.len() as u32 + 1 > self.max_requests {
            return Err(RateLimitError::Requests {
                retry_after_secs: self.retry_after(entries, now),
            });
        }

        let current_tokens: u64 = entries.iter().map(|e| e.tokens).sum();
        if current_tokens + tokens > self.max_tokens {
            return Err(RateLimitError::Tokens {
                retry_after_secs: self.retry_after(entries, now),
            });
        }

        Ok(())
    }

    fn evict(entries: &mut VecDeque<Entry>, now: Instant, window: Duration) {
        while let Some(front) = entries.front() {
            if now.duration_since(front.at) > window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Seconds until the earliest entry leaves the window: floor zero, ceiled.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn retry_after(&self, entries: &VecDeque<Entry>, now: Instant) -> u64 {
        entries.front().map_or(0, |front| {
            let elapsed = now.duration_since(front.at);
            self.window
                .saturating_sub(elapsed)
                .as_secs_f64()
                .ceil()
                .max(0.0) as u64
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_and_record_under_limits() {
        let limiter = RateLimiter::new(10, 1_000);
        for _ in 0..10 {
            limiter.check_and_record(50).unwrap();
        }
        assert_eq!(limiter.current_requests(), 10);
        assert_eq!(limiter.current_tokens(), 500);
    }

    #[test]
    fn test_request_ceiling() {
        let limiter = RateLimiter::new(3, 1_000_000);
        for _ in 0..3 {
            limiter.check_and_record(1).unwrap();
        }
        let err = limiter.check_and_record(1).unwrap_err();
        assert!(matches!(err, RateLimitError::Requests { .. }));
        // Retry-after never exceeds the window width.
        assert!(err.retry_after_secs() <= 60);
    }

    #[test]
    fn test_token_ceiling() {
        let limiter = RateLimiter::new(100, 1_000);
        limiter.check_and_record(900).unwrap();
        let err = limiter.check_and_record(200).unwrap_err();
        assert!(matches!(err, RateLimitError::Tokens { .. }));
        // A fitting call still passes.
        limiter.check_and_record(100).unwrap();
    }

    #[test]
    fn test_check_does_not_record() {
        let limiter = RateLimiter::new(10, 1_000);
        limiter.check(500).unwrap();
        assert_eq!(limiter.current_requests(), 0);
        assert_eq!(limiter.current_tokens(), 0);
    }

    #[test]
    fn test_failed_check_records_nothing() {
        let limiter = RateLimiter::new(1, 1_000);
        limiter.check_and_record(1).unwrap();
        let _ = limiter.check_and_record(1).unwrap_err();
        assert_eq!(limiter.current_requests(), 1);
    }

    #[test]
    fn test_window_eviction() {
        let limiter = RateLimiter::with_window(1, 1_000, Duration::from_millis(30));
        limiter.check_and_record(10).unwrap();
        assert!(limiter.check_and_record(10).is_err());

        std::thread::sleep(Duration::from_millis(50));
        // The old entry has left the window.
        limiter.check_and_record(10).unwrap();
        assert_eq!(limiter.current_requests(), 1);
    }

    #[test]
    fn test_oversize_single_call_with_empty_window() {
        let limiter = RateLimiter::new(10, 100);
        let err = limiter.check_and_record(500).unwrap_err();
        // No entries to wait out; retry-after floors at zero.
        assert_eq!(err.retry_after_secs(), 0);
    }

    #[test]
    fn test_concurrent_check_and_record() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(64, 1_000_000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..8 {
                    limiter.check_and_record(10).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(limiter.current_requests(), 64);
        assert_eq!(limiter.current_tokens(), 640);
    }
}
