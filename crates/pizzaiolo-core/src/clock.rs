//! Time source for transitions and sweeps.
//!
//! The pure state functions take `now` as an argument. The engine reads it
//! from a [`Clock`] so that tests can pin and advance time.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to. Millisecond resolution.
#[derive(Debug)]
pub struct FixedClock {
	millis: AtomicI64,
}

impl FixedClock {
	pub fn new(at: DateTime<Utc>) -> Self {
		Self {
			millis: AtomicI64::new(at.timestamp_millis()),
		}
	}

	pub fn set(&self, at: DateTime<Utc>) {
		self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
	}

	pub fn advance(&self, by: Duration) {
		self.millis
			.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
	}
}

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pizzaiolo_types::parse_instant;

	#[test]
	fn test_fixed_clock_moves_only_when_told() {
		let start = parse_instant("2026-01-15T11:00:00.000Z").unwrap();
		let clock = FixedClock::new(start);
		assert_eq!(clock.now(), start);

		clock.advance(Duration::seconds(1));
		assert_eq!(
			clock.now(),
			parse_instant("2026-01-15T11:00:01.000Z").unwrap()
		);

		clock.set(start);
		assert_eq!(clock.now(), start);
	}
}
