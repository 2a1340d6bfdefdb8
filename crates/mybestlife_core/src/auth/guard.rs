//! Request throttling and account lockout.
//!
//! # Invariants
//! - Both guards are keyed by caller-chosen strings and hold state in memory.
//! - Time comes from the caller as Unix epoch milliseconds.
//! - Expired windows and lockouts are dropped lazily on access, and swept
//!   from the whole map once it holds `PRUNE_THRESHOLD` keys.
//! - Failure counters older than the lockout duration no longer count.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RATE_MAX: u32 = 5;
pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(15 * 60);
/// Map size at which a full sweep of expired entries runs.
pub const PRUNE_THRESHOLD: usize = 1024;

/// Rejection carrying the number of seconds until the caller may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAfter {
    pub secs: u64,
}

impl RetryAfter {
    fn until(deadline_ms: i64, now_ms: i64) -> Self {
        let remaining = deadline_ms.saturating_sub(now_ms).max(0) as u64;
        Self {
            secs: remaining.div_ceil(1000).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_ms: i64,
    count: u32,
}

/// Fixed-window request counter.
#[derive(Debug)]
pub struct RateLimiter {
    window_ms: i64,
    max_requests: u32,
    windows: Mutex<HashMap<String, Window>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_WINDOW, DEFAULT_RATE_MAX)
    }
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window_ms: duration_ms(window),
            max_requests: max_requests.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for `key`; rejects once the window is full.
    pub fn check(&self, key: &str, now_ms: i64) -> Result<(), RetryAfter> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if windows.len() >= PRUNE_THRESHOLD {
            prune_windows(&mut windows, self.window_ms, now_ms);
        }
        let window = windows.entry(key.to_string()).or_insert(Window {
            started_ms: now_ms,
            count: 0,
        });
        if now_ms.saturating_sub(window.started_ms) >= self.window_ms {
            *window = Window {
                started_ms: now_ms,
                count: 0,
            };
        }
        if window.count >= self.max_requests {
            return Err(RetryAfter::until(
                window.started_ms.saturating_add(self.window_ms),
                now_ms,
            ));
        }
        window.count += 1;
        Ok(())
    }

    /// Drops every window that has fully elapsed; returns how many were removed.
    pub fn prune(&self, now_ms: i64) -> usize {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        prune_windows(&mut windows, self.window_ms, now_ms)
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn prune_windows(windows: &mut HashMap<String, Window>, window_ms: i64, now_ms: i64) -> usize {
    let before = windows.len();
    windows.retain(|_, window| now_ms.saturating_sub(window.started_ms) < window_ms);
    before - windows.len()
}

#[derive(Debug, Clone, Copy, Default)]
struct Attempts {
    failures: u32,
    last_failure_ms: i64,
    locked_until_ms: Option<i64>,
}

impl Attempts {
    fn is_stale(&self, lockout_ms: i64, now_ms: i64) -> bool {
        match self.locked_until_ms {
            Some(until) => until <= now_ms,
            None => now_ms.saturating_sub(self.last_failure_ms) >= lockout_ms,
        }
    }
}

/// Per-account failed-login counter with timed lockout.
#[derive(Debug)]
pub struct LoginLockout {
    max_attempts: u32,
    lockout_ms: i64,
    accounts: Mutex<HashMap<String, Attempts>>,
}

impl Default for LoginLockout {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOGIN_ATTEMPTS, DEFAULT_LOCKOUT)
    }
}

impl LoginLockout {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout_ms: duration_ms(lockout),
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Rejects while `key` is locked.
    pub fn check(&self, key: &str, now_ms: i64) -> Result<(), RetryAfter> {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(attempts) = accounts.get(key).copied() else {
            return Ok(());
        };
        if attempts.is_stale(self.lockout_ms, now_ms) {
            accounts.remove(key);
            return Ok(());
        }
        match attempts.locked_until_ms {
            Some(until) => Err(RetryAfter::until(until, now_ms)),
            None => Ok(()),
        }
    }

    /// Records a failed attempt; returns the lock deadline when this one locks.
    pub fn record_failure(&self, key: &str, now_ms: i64) -> Option<i64> {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        if accounts.len() >= PRUNE_THRESHOLD {
            prune_attempts(&mut accounts, self.lockout_ms, now_ms);
        }
        let attempts = accounts.entry(key.to_string()).or_default();
        if attempts.is_stale(self.lockout_ms, now_ms) {
            *attempts = Attempts::default();
        }
        attempts.failures = attempts.failures.saturating_add(1);
        attempts.last_failure_ms = now_ms;
        if attempts.failures >= self.max_attempts {
            let until = now_ms.saturating_add(self.lockout_ms);
            attempts.locked_until_ms = Some(until);
            return Some(until);
        }
        None
    }

    pub fn record_success(&self, key: &str) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, |attempts| attempts.failures)
    }

    /// Drops expired lockouts and stale failure counters.
    pub fn prune(&self, now_ms: i64) -> usize {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        prune_attempts(&mut accounts, self.lockout_ms, now_ms)
    }

    pub fn tracked_keys(&self) -> usize {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn prune_attempts(accounts: &mut HashMap<String, Attempts>, lockout_ms: i64, now_ms: i64) -> usize {
    let before = accounts.len();
    accounts.retain(|_, attempts| !attempts.is_stale(lockout_ms, now_ms));
    before - accounts.len()
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
