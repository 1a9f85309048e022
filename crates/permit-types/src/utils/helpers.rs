//! Time sources.
//!
//! Deadlines and cache expiry read the current time through [`Clock`] so
//! tests can pin it with [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Current UNIX timestamp in seconds; 0 if the system clock is before the epoch.
pub fn current_timestamp() -> u64 {
	u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Source of the current UNIX time in seconds.
pub trait Clock: Send + Sync {
	fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> u64 {
		current_timestamp()
	}
}

/// Settable clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicU64,
}

impl ManualClock {
	/// A clock stopped at `now`.
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

impl Clock for ManualClock {
	fn now(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}
