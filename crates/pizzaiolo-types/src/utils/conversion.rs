//! Conversions between ISO-8601 instants and epoch milliseconds.
//!
//! The ISO string is the canonical wire representation. Millisecond mirrors
//! are derived from it and must agree with it to the millisecond.

use chrono::{DateTime, SecondsFormat, Utc};

/// Parses an RFC 3339 / ISO-8601 instant with an explicit offset.
pub fn parse_instant(iso: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(iso)
		.ok()
		.map(|at| at.with_timezone(&Utc))
}

/// Formats an instant the way records store it: UTC, millisecond precision,
/// `Z` suffix (`2026-01-15T11:00:01.000Z`).
pub fn format_instant(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch milliseconds of an ISO instant.
pub fn iso_to_ms(iso: &str) -> Option<i64> {
	parse_instant(iso).map(|at| at.timestamp_millis())
}

/// ISO instant of an epoch millisecond value.
pub fn ms_to_iso(ms: i64) -> Option<String> {
	DateTime::from_timestamp_millis(ms).map(format_instant)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_iso_to_ms() {
		assert_eq!(iso_to_ms("1970-01-01T00:00:01.500Z"), Some(1500));
		assert_eq!(
			iso_to_ms("2026-01-15T10:00:00.000Z"),
			iso_to_ms("2026-01-15T12:00:00.000+02:00")
		);
		assert_eq!(iso_to_ms("not a date"), None);
		assert_eq!(iso_to_ms(""), None);
	}

	#[test]
	fn test_round_trip_to_millisecond() {
		for iso in [
			"2026-01-15T10:00:00.000Z",
			"2026-01-15T23:59:59.999Z",
			"1999-12-31T00:00:00.001Z",
		] {
			let ms = iso_to_ms(iso).unwrap();
			let back = ms_to_iso(ms).unwrap();
			assert_eq!(back, iso);
			assert_eq!(iso_to_ms(&back), Some(ms));
		}
	}

	#[test]
	fn test_sub_millisecond_precision_is_truncated() {
		let ms = iso_to_ms("2026-01-15T10:00:00.123456Z").unwrap();
		assert_eq!(ms_to_iso(ms).unwrap(), "2026-01-15T10:00:00.123Z");
	}
}
