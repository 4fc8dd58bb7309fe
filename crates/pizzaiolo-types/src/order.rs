//! Order record types for the fulfillment lifecycle.
//!
//! `OrderV2` is the unit of work tracked from placement through the kitchen to
//! hand-off or cancellation. Its wire form is a camelCase JSON object whose
//! instants are ISO-8601 strings; the optional `*Ms` fields mirror those
//! instants as epoch milliseconds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An enumerated field as it was found on a record.
///
/// Records come from a document store written by other programs, so an enum
/// field may hold a value this build does not know. Keeping the raw string lets
/// validation and the state machine report it instead of rejecting the whole
/// document at deserialization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code<T> {
	/// A recognized enum member.
	Known(T),
	/// Anything else, kept verbatim.
	Unrecognized(String),
}

impl<T: Copy> Code<T> {
	/// Returns the recognized value, if any.
	pub fn known(&self) -> Option<T> {
		match self {
			Code::Known(value) => Some(*value),
			Code::Unrecognized(_) => None,
		}
	}
}

impl<T> Default for Code<T> {
	fn default() -> Self {
		Code::Unrecognized(String::new())
	}
}

impl<T> From<T> for Code<T> {
	fn from(value: T) -> Self {
		Code::Known(value)
	}
}

impl<T: fmt::Display> fmt::Display for Code<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Code::Known(value) => write!(f, "{}", value),
			Code::Unrecognized(raw) => write!(f, "{:?}", raw),
		}
	}
}

impl<T: FromStr> Code<T> {
	/// Parses a raw string, keeping values that name no member.
	pub fn parse(raw: &str) -> Self {
		raw.parse()
			.map(Code::Known)
			.unwrap_or_else(|_| Code::Unrecognized(raw.to_string()))
	}
}

/// Error returned when a string names no member of an order enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
	pub kind: &'static str,
	pub value: String,
}

macro_rules! wire_enum {
	(
		$(#[$meta:meta])*
		$name:ident, $kind:literal {
			$( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		pub enum $name {
			$( $(#[$vmeta])* #[serde(rename = $wire)] $variant, )+
		}

		impl $name {
			/// Every member, in declaration order.
			pub const ALL: &'static [$name] = &[$($name::$variant),+];

			/// Returns the wire representation.
			pub fn as_str(&self) -> &'static str {
				match self {
					$( $name::$variant => $wire, )+
				}
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl FromStr for $name {
			type Err = UnknownVariant;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$( $wire => Ok($name::$variant), )+
					_ => Err(UnknownVariant {
						kind: $kind,
						value: s.to_string(),
					}),
				}
			}
		}
	};
}

wire_enum! {
	/// Position of an order in the kitchen workflow.
	KitchenStatus, "kitchen status" {
		/// Placed, not yet accepted by the kitchen.
		New => "NEW",
		/// Accepted and waiting for a cook.
		Queued => "QUEUED",
		/// Being prepared.
		Prepping => "PREPPING",
		/// Ready for pickup or driver.
		Ready => "READY",
		/// Handed to the customer or courier.
		Handoff => "HANDOFF",
		/// Completed.
		Done => "DONE",
		/// Canceled by staff.
		Canceled => "CANCELED",
		/// Expired by automation.
		Expired => "EXPIRED",
	}
}

wire_enum! {
	/// Payment state, owned by the external payment capture process.
	PaymentStatus, "payment status" {
		Paid => "PAID",
		Unpaid => "UNPAID",
		Issue => "ISSUE",
	}
}

wire_enum! {
	/// How the order leaves the truck.
	Fulfillment, "fulfillment" {
		Pickup => "PICKUP",
		Delivery => "DELIVERY",
	}
}

wire_enum! {
	/// Where the order was placed. Informational only.
	Channel, "channel" {
		Web => "WEB",
		Phone => "PHONE",
		OnSite => "ON_SITE",
		Uber => "UBER",
	}
}

impl KitchenStatus {
	/// Statuses with no outgoing transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			KitchenStatus::Done | KitchenStatus::Canceled | KitchenStatus::Expired
		)
	}

	/// The timestamp written when an order enters this status.
	///
	/// `New` is only ever the initial status, so it has no slot.
	pub fn timestamp_slot(&self) -> Option<TimestampSlot> {
		match self {
			KitchenStatus::New => None,
			KitchenStatus::Queued => Some(TimestampSlot::AcceptedAt),
			KitchenStatus::Prepping => Some(TimestampSlot::StartedAt),
			KitchenStatus::Ready => Some(TimestampSlot::ReadyAt),
			KitchenStatus::Handoff => Some(TimestampSlot::HandedOffAt),
			KitchenStatus::Done => Some(TimestampSlot::CompletedAt),
			KitchenStatus::Canceled => Some(TimestampSlot::CanceledAt),
			KitchenStatus::Expired => Some(TimestampSlot::ExpiredAt),
		}
	}
}

/// One line of an order. Opaque to the fulfillment lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
	pub name: String,
	pub qty: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<serde_json::Value>,
}

/// Instants written by the state machine and automation as transitions occur.
///
/// Every field is written at most once and never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTimestamps {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub accepted_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub started_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ready_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub handed_off_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub canceled_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expired_at: Option<String>,
}

/// Names one field of [`OrderTimestamps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampSlot {
	AcceptedAt,
	StartedAt,
	ReadyAt,
	HandedOffAt,
	CompletedAt,
	CanceledAt,
	ExpiredAt,
}

impl TimestampSlot {
	pub const ALL: [TimestampSlot; 7] = [
		TimestampSlot::AcceptedAt,
		TimestampSlot::StartedAt,
		TimestampSlot::ReadyAt,
		TimestampSlot::HandedOffAt,
		TimestampSlot::CompletedAt,
		TimestampSlot::CanceledAt,
		TimestampSlot::ExpiredAt,
	];

	/// The camelCase field name used on the wire.
	pub fn field_name(&self) -> &'static str {
		match self {
			TimestampSlot::AcceptedAt => "acceptedAt",
			TimestampSlot::StartedAt => "startedAt",
			TimestampSlot::ReadyAt => "readyAt",
			TimestampSlot::HandedOffAt => "handedOffAt",
			TimestampSlot::CompletedAt => "completedAt",
			TimestampSlot::CanceledAt => "canceledAt",
			TimestampSlot::ExpiredAt => "expiredAt",
		}
	}
}

impl OrderTimestamps {
	fn slot_mut(&mut self, slot: TimestampSlot) -> &mut Option<String> {
		match slot {
			TimestampSlot::AcceptedAt => &mut self.accepted_at,
			TimestampSlot::StartedAt => &mut self.started_at,
			TimestampSlot::ReadyAt => &mut self.ready_at,
			TimestampSlot::HandedOffAt => &mut self.handed_off_at,
			TimestampSlot::CompletedAt => &mut self.completed_at,
			TimestampSlot::CanceledAt => &mut self.canceled_at,
			TimestampSlot::ExpiredAt => &mut self.expired_at,
		}
	}

	/// Returns the value stored in `slot`.
	pub fn get(&self, slot: TimestampSlot) -> Option<&str> {
		match slot {
			TimestampSlot::AcceptedAt => self.accepted_at.as_deref(),
			TimestampSlot::StartedAt => self.started_at.as_deref(),
			TimestampSlot::ReadyAt => self.ready_at.as_deref(),
			TimestampSlot::HandedOffAt => self.handed_off_at.as_deref(),
			TimestampSlot::CompletedAt => self.completed_at.as_deref(),
			TimestampSlot::CanceledAt => self.canceled_at.as_deref(),
			TimestampSlot::ExpiredAt => self.expired_at.as_deref(),
		}
	}

	/// Writes `at` into `slot` unless it already holds a value.
	///
	/// Returns whether the slot was written.
	pub fn record(&mut self, slot: TimestampSlot, at: String) -> bool {
		let entry = self.slot_mut(slot);
		if entry.is_some() {
			return false;
		}
		*entry = Some(at);
		true
	}

	/// Iterates over the populated slots.
	pub fn populated(&self) -> impl Iterator<Item = (TimestampSlot, &str)> + '_ {
		TimestampSlot::ALL
			.into_iter()
			.filter_map(move |slot| self.get(slot).map(|at| (slot, at)))
	}
}

/// Per-order switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFlags {
	/// Lets a supervisor hand off or complete an order that is not paid.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub manager_override: Option<bool>,
}

/// A storefront order, version 2 of the record format.
///
/// Fields that upstream writers may omit or malform default to empty values
/// here so that validation can report every problem in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderV2 {
	/// Opaque unique identifier, immutable once created.
	#[serde(default)]
	pub id: String,
	/// Creation instant (ISO-8601).
	#[serde(default)]
	pub created_at: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at_ms: Option<i64>,
	/// Instant fulfillment was promised for (ISO-8601).
	#[serde(default)]
	pub promised_at: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub promised_at_ms: Option<i64>,
	/// Last write bookkeeping, maintained by the persistence layer.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at_ms: Option<i64>,
	#[serde(default)]
	pub kitchen_status: Code<KitchenStatus>,
	#[serde(default)]
	pub payment_status: Code<PaymentStatus>,
	#[serde(default)]
	pub fulfillment: Code<Fulfillment>,
	#[serde(default)]
	pub channel: Code<Channel>,
	#[serde(default)]
	pub items: Option<Vec<OrderItem>>,
	#[serde(default)]
	pub timestamps: Option<OrderTimestamps>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub flags: Option<OrderFlags>,
	/// Back-reference to the record this one was migrated from.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub legacy: Option<serde_json::Value>,
}

impl OrderV2 {
	/// Whether `flags.managerOverride` is explicitly set to true.
	pub fn manager_override(&self) -> bool {
		self.flags
			.as_ref()
			.and_then(|flags| flags.manager_override)
			.unwrap_or(false)
	}

	/// Payment gate for hand-off and completion: paid, or overridden.
	pub fn payment_cleared(&self) -> bool {
		self.payment_status.known() == Some(PaymentStatus::Paid) || self.manager_override()
	}

	/// Whether the order can still move. Unrecognized statuses count as open
	/// so that sweeps surface them rather than silently skipping.
	pub fn is_open(&self) -> bool {
		!self
			.kitchen_status
			.known()
			.is_some_and(|status| status.is_terminal())
	}
}

impl fmt::Display for OrderV2 {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"order {} [{} / {} / {}]",
			self.id, self.kitchen_status, self.payment_status, self.fulfillment
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn wire_order() -> serde_json::Value {
		json!({
			"id": "ord_1",
			"createdAt": "2026-01-15T09:30:00.000Z",
			"promisedAt": "2026-01-15T10:00:00.000Z",
			"kitchenStatus": "READY",
			"paymentStatus": "UNPAID",
			"fulfillment": "PICKUP",
			"channel": "ON_SITE",
			"items": [{ "name": "Margherita", "qty": 2 }],
			"timestamps": { "acceptedAt": "2026-01-15T09:31:00.000Z" }
		})
	}

	#[test]
	fn test_deserialize_wire_order() {
		let order: OrderV2 = serde_json::from_value(wire_order()).unwrap();

		assert_eq!(order.kitchen_status, Code::Known(KitchenStatus::Ready));
		assert_eq!(order.channel.known(), Some(Channel::OnSite));
		assert_eq!(order.items.as_ref().map(Vec::len), Some(1));
		assert_eq!(
			order
				.timestamps
				.as_ref()
				.and_then(|ts| ts.get(TimestampSlot::AcceptedAt)),
			Some("2026-01-15T09:31:00.000Z")
		);
		assert!(!order.manager_override());
	}

	#[test]
	fn test_unrecognized_enum_is_kept() {
		let mut value = wire_order();
		value["kitchenStatus"] = json!("BURNT");

		let order: OrderV2 = serde_json::from_value(value).unwrap();
		assert_eq!(
			order.kitchen_status,
			Code::Unrecognized("BURNT".to_string())
		);

		let back = serde_json::to_value(&order).unwrap();
		assert_eq!(back["kitchenStatus"], json!("BURNT"));
	}

	#[test]
	fn test_serialize_omits_absent_optionals() {
		let order: OrderV2 = serde_json::from_value(wire_order()).unwrap();
		let value = serde_json::to_value(&order).unwrap();

		assert!(value.get("createdAtMs").is_none());
		assert!(value.get("flags").is_none());
		assert_eq!(value["channel"], json!("ON_SITE"));
		assert!(value["timestamps"].get("readyAt").is_none());
	}

	#[test]
	fn test_record_never_overwrites() {
		let mut ts = OrderTimestamps::default();

		assert!(ts.record(TimestampSlot::ReadyAt, "a".to_string()));
		assert!(!ts.record(TimestampSlot::ReadyAt, "b".to_string()));
		assert_eq!(ts.get(TimestampSlot::ReadyAt), Some("a"));
		assert_eq!(ts.populated().count(), 1);
	}

	#[test]
	fn test_terminal_statuses() {
		let terminal: Vec<_> = KitchenStatus::ALL
			.iter()
			.filter(|s| s.is_terminal())
			.collect();
		assert_eq!(
			terminal,
			vec![
				&KitchenStatus::Done,
				&KitchenStatus::Canceled,
				&KitchenStatus::Expired
			]
		);
	}

	#[test]
	fn test_code_from_str() {
		assert_eq!(
			Code::<KitchenStatus>::parse("QUEUED"),
			Code::Known(KitchenStatus::Queued)
		);
		assert_eq!(
			Code::<KitchenStatus>::parse("queued"),
			Code::Unrecognized("queued".to_string())
		);
		assert!("ON_SITE".parse::<Channel>().is_ok());
		assert!("SMOKE_SIGNAL".parse::<Channel>().is_err());
	}
}
