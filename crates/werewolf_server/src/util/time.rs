#![forbid(unsafe_code)]

#[cfg(test)]
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
#[inline]
pub fn unix_ms_now() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or(Duration::from_secs(0))
		.as_millis() as i64
}

/// Source of "now" for phase deadlines and chat timestamps.
pub trait Clock: Send + Sync + 'static {
	fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_ms(&self) -> i64 {
		unix_ms_now()
	}
}

/// Hand-driven clock.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicI64,
}

#[cfg(test)]
impl ManualClock {
	pub fn new(start_ms: i64) -> Self {
		Self {
			now: AtomicI64::new(start_ms),
		}
	}

	pub fn advance(&self, by: Duration) {
		let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
		self.now.fetch_add(by, Ordering::Relaxed);
	}
}

#[cfg(test)]
impl Clock for ManualClock {
	fn now_ms(&self) -> i64 {
		self.now.load(Ordering::Relaxed)
	}
}
