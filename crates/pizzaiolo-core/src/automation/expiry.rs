//! Expiry of abandoned pickup orders.
//!
//! A pickup order that was never paid for and is still being worked on, or
//! waiting on the counter, long after its promised time is assumed abandoned.
//! Such orders move to `EXPIRED` so the board stops showing them.

use crate::state::machine::enter_status;
use chrono::{DateTime, Duration, Utc};
use pizzaiolo_types::{parse_instant, Code, Fulfillment, KitchenStatus, OrderV2, PaymentStatus};

/// Minutes past `promisedAt` before an unpaid pickup order expires.
pub const DEFAULT_GRACE_MINUTES: i64 = 60;

/// Statuses automation may expire from.
const EXPIRABLE: [KitchenStatus; 4] = [
	KitchenStatus::New,
	KitchenStatus::Queued,
	KitchenStatus::Prepping,
	KitchenStatus::Ready,
];

/// Result of evaluating the expiry rule on one order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpiryOutcome<'a> {
	/// The rule does not apply. Holds the input.
	Unchanged(&'a OrderV2),
	/// The order expired. Holds the updated copy.
	Expired(OrderV2),
}

impl<'a> ExpiryOutcome<'a> {
	pub fn changed(&self) -> bool {
		matches!(self, ExpiryOutcome::Expired(_))
	}

	pub fn order(&self) -> &OrderV2 {
		match self {
			ExpiryOutcome::Unchanged(order) => order,
			ExpiryOutcome::Expired(order) => order,
		}
	}

	pub fn into_owned(self) -> OrderV2 {
		match self {
			ExpiryOutcome::Unchanged(order) => order.clone(),
			ExpiryOutcome::Expired(order) => order,
		}
	}
}

/// The expiry rule with its grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoExpireRule {
	grace: Duration,
}

impl Default for AutoExpireRule {
	fn default() -> Self {
		Self::new(Duration::minutes(DEFAULT_GRACE_MINUTES))
	}
}

impl AutoExpireRule {
	pub fn new(grace: Duration) -> Self {
		Self { grace }
	}

	pub fn from_minutes(minutes: u64) -> Self {
		let minutes = i64::try_from(minutes).unwrap_or(i64::MAX);
		Self::new(Duration::try_minutes(minutes).unwrap_or(Duration::MAX))
	}

	pub fn grace(&self) -> Duration {
		self.grace
	}

	/// The instant after which `order` would expire, if it is eligible at all.
	pub fn deadline(&self, order: &OrderV2) -> Option<DateTime<Utc>> {
		if order.fulfillment != Code::Known(Fulfillment::Pickup)
			|| order.payment_status != Code::Known(PaymentStatus::Unpaid)
		{
			return None;
		}
		let status = order.kitchen_status.known()?;
		if !EXPIRABLE.contains(&status) {
			return None;
		}
		parse_instant(&order.promised_at)?.checked_add_signed(self.grace)
	}

	/// Expires `order` if it is an unpaid pickup in an active status and
	/// `now` is strictly past `promisedAt` plus the grace period.
	///
	/// An expired order gets `kitchenStatus = EXPIRED` and
	/// `timestamps.expiredAt = now`. An order whose `promisedAt` cannot be
	/// parsed is left alone.
	pub fn evaluate<'a>(&self, order: &'a OrderV2, now: DateTime<Utc>) -> ExpiryOutcome<'a> {
		match self.deadline(order) {
			Some(deadline) if now > deadline => {
				ExpiryOutcome::Expired(enter_status(order, KitchenStatus::Expired, now))
			},
			_ => ExpiryOutcome::Unchanged(order),
		}
	}
}

/// Applies the expiry rule with the default 60 minute grace period.
pub fn auto_expire(order: &OrderV2, now: DateTime<Utc>) -> ExpiryOutcome<'_> {
	AutoExpireRule::default().evaluate(order, now)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{at, order};
	use pizzaiolo_types::{OrderFlags, TimestampSlot};

	/// Pickup, unpaid, READY, promised for 10:00.
	fn abandoned() -> OrderV2 {
		let mut o = order();
		o.kitchen_status = Code::Known(KitchenStatus::Ready);
		o.payment_status = Code::Known(PaymentStatus::Unpaid);
		o.fulfillment = Code::Known(Fulfillment::Pickup);
		o.promised_at = "2026-01-15T10:00:00.000Z".to_string();
		o
	}

	#[test]
	fn test_expires_one_second_past_grace() {
		let o = abandoned();
		let outcome = auto_expire(&o, at("2026-01-15T11:00:01.000Z"));

		assert!(outcome.changed());
		let expired = outcome.into_owned();
		assert_eq!(expired.kitchen_status, Code::Known(KitchenStatus::Expired));
		assert_eq!(
			expired
				.timestamps
				.as_ref()
				.and_then(|ts| ts.get(TimestampSlot::ExpiredAt)),
			Some("2026-01-15T11:00:01.000Z")
		);
		assert_eq!(expired.payment_status, o.payment_status);
		assert_eq!(expired.promised_at, o.promised_at);
	}

	#[test]
	fn test_exactly_at_deadline_is_unchanged() {
		let o = abandoned();
		let outcome = auto_expire(&o, at("2026-01-15T11:00:00.000Z"));

		assert!(!outcome.changed());
		assert!(std::ptr::eq(outcome.order(), &o));
		assert_eq!(outcome, ExpiryOutcome::Unchanged(&o));
	}

	#[test]
	fn test_inside_grace_is_unchanged() {
		let o = abandoned();
		assert!(!auto_expire(&o, at("2026-01-15T10:59:59.000Z")).changed());
		assert!(auto_expire(&o, at("2026-01-15T11:00:01.000Z")).changed());
	}

	#[test]
	fn test_expired_order_stays_unchanged() {
		let expired = auto_expire(&abandoned(), at("2026-01-15T11:30:00.000Z")).into_owned();
		assert_eq!(expired.kitchen_status, Code::Known(KitchenStatus::Expired));

		for now in [at("2026-01-15T13:00:00.000Z"), at("2026-01-16T09:00:00.000Z")] {
			let outcome = auto_expire(&expired, now);
			assert!(!outcome.changed());
			assert!(std::ptr::eq(outcome.order(), &expired));
		}
		assert_eq!(
			expired.timestamps.unwrap().expired_at.as_deref(),
			Some("2026-01-15T11:30:00.000Z")
		);
	}

	#[test]
	fn test_paid_is_never_expired() {
		let mut o = abandoned();
		o.payment_status = Code::Known(PaymentStatus::Paid);
		assert!(!auto_expire(&o, at("2026-01-16T10:00:00.000Z")).changed());

		o.payment_status = Code::Known(PaymentStatus::Issue);
		assert!(!auto_expire(&o, at("2026-01-16T10:00:00.000Z")).changed());
	}

	#[test]
	fn test_delivery_is_never_expired() {
		let mut o = abandoned();
		o.fulfillment = Code::Known(Fulfillment::Delivery);
		assert!(!auto_expire(&o, at("2026-01-16T10:00:00.000Z")).changed());
	}

	#[test]
	fn test_only_active_statuses_expire() {
		let now = at("2026-01-16T10:00:00.000Z");
		for status in KitchenStatus::ALL {
			let mut o = abandoned();
			o.kitchen_status = Code::Known(*status);
			// HANDOFF and DONE unpaid need an override to be reachable at all
			o.flags = Some(OrderFlags {
				manager_override: Some(true),
			});

			assert_eq!(
				auto_expire(&o, now).changed(),
				EXPIRABLE.contains(status),
				"{}",
				status
			);
		}

		let mut odd = abandoned();
		odd.kitchen_status = Code::Unrecognized("BURNT".to_string());
		assert!(!auto_expire(&odd, now).changed());
	}

	#[test]
	fn test_unparseable_promised_at_is_unchanged() {
		let mut o = abandoned();
		o.promised_at = "later".to_string();
		assert!(!auto_expire(&o, at("2030-01-01T00:00:00.000Z")).changed());
	}

	#[test]
	fn test_existing_expired_at_is_kept() {
		let mut o = abandoned();
		o.timestamps.get_or_insert_with(Default::default).expired_at =
			Some("2026-01-15T10:30:00.000Z".to_string());

		let expired = auto_expire(&o, at("2026-01-15T12:00:00.000Z")).into_owned();
		assert_eq!(
			expired.timestamps.unwrap().expired_at.as_deref(),
			Some("2026-01-15T10:30:00.000Z")
		);
	}

	#[test]
	fn test_custom_grace() {
		let rule = AutoExpireRule::from_minutes(15);
		let o = abandoned();

		assert_eq!(rule.deadline(&o), Some(at("2026-01-15T10:15:00.000Z")));
		assert!(!rule.evaluate(&o, at("2026-01-15T10:15:00.000Z")).changed());
		assert!(rule.evaluate(&o, at("2026-01-15T10:15:00.001Z")).changed());
		assert_eq!(AutoExpireRule::default().grace(), Duration::minutes(60));
	}
}
