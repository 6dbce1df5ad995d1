//! Injectable clock used for JWT issuance, expiry checks and delegate validity.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Source of the current time in seconds since the Unix epoch
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> u64;
}

/// Reads the host clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct FixedTimeProvider {
    now: AtomicU64,
}

impl FixedTimeProvider {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
