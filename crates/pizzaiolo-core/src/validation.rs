//! Structural validation and normalization of order records.
//!
//! Orders reach the service from the storefront, phone staff and delivery
//! integrations, and from records migrated out of the first record format.
//! [`validate_order_v2`] checks a typed record and reports every problem it
//! finds at once. [`parse_order_v2`] does the same starting from raw JSON, so
//! that a wrong-shaped field is reported alongside the other problems instead
//! of aborting deserialization.

use pizzaiolo_types::{iso_to_ms, Code, KitchenStatus, OrderItem, OrderV2, TimestampSlot};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Longest accepted order id, in bytes. Keeps the id usable as a file name
/// in every storage backend.
pub const MAX_ORDER_ID_BYTES: usize = 100;

/// Fields that must hold a JSON string when present.
const STRING_FIELDS: [&str; 7] = [
	"id",
	"createdAt",
	"promisedAt",
	"kitchenStatus",
	"paymentStatus",
	"fulfillment",
	"channel",
];

/// Millisecond mirrors, integers or null.
const MILLIS_FIELDS: [&str; 3] = ["createdAtMs", "promisedAtMs", "updatedAtMs"];

/// Every problem found on one record, in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid order: {}", .errors.join("; "))]
pub struct ValidationErrors {
	pub errors: Vec<String>,
}

impl ValidationErrors {
	fn single(message: impl Into<String>) -> Self {
		Self {
			errors: vec![message.into()],
		}
	}

	/// Whether any message contains `needle`.
	pub fn mentions(&self, needle: &str) -> bool {
		self.errors.iter().any(|e| e.contains(needle))
	}
}

/// Collects messages while checks run.
#[derive(Default)]
struct Report {
	errors: Vec<String>,
}

impl Report {
	fn push(&mut self, message: String) {
		self.errors.push(message);
	}

	fn finish(self) -> Result<(), ValidationErrors> {
		if self.errors.is_empty() {
			Ok(())
		} else {
			Err(ValidationErrors {
				errors: self.errors,
			})
		}
	}

	fn instant(&mut self, field: &str, value: &str) -> Option<i64> {
		let ms = iso_to_ms(value);
		if ms.is_none() {
			self.push(format!(
				"{} must be an ISO-8601 instant, got {:?}",
				field, value
			));
		}
		ms
	}

	fn mirror(&mut self, field: &str, iso_ms: Option<i64>, mirror: Option<i64>) {
		// Unparseable ISO values are already reported
		if let (Some(expected), Some(actual)) = (iso_ms, mirror) {
			if expected != actual {
				self.push(format!(
					"{}Ms is {} but {} is {}",
					field, actual, field, expected
				));
			}
		}
	}

	fn code<T: fmt::Display + Copy>(&mut self, field: &str, value: &Code<T>, allowed: &[T]) {
		if let Code::Unrecognized(raw) = value {
			let names: Vec<String> = allowed.iter().map(T::to_string).collect();
			self.push(format!(
				"{} {:?} is not one of {}",
				field,
				raw,
				names.join(", ")
			));
		}
	}
}

/// Checks one order record.
///
/// Reports, in order: missing id, unparseable instants, millisecond mirrors
/// that disagree with their ISO values, unrecognized enum values, missing
/// `items` or `timestamps`, unparseable timestamps, and a `HANDOFF`/`DONE`
/// order whose payment is not cleared.
pub fn validate_order_v2(order: &OrderV2) -> Result<(), ValidationErrors> {
	use pizzaiolo_types::{Channel, Fulfillment, PaymentStatus};

	let mut report = Report::default();

	if order.id.trim().is_empty() {
		report.push("id is required".to_string());
	} else if order.id.len() > MAX_ORDER_ID_BYTES {
		report.push(format!(
			"id must be at most {} bytes, got {}",
			MAX_ORDER_ID_BYTES,
			order.id.len()
		));
	}

	let created_ms = report.instant("createdAt", &order.created_at);
	let promised_ms = report.instant("promisedAt", &order.promised_at);
	let updated_ms = order
		.updated_at
		.as_deref()
		.and_then(|updated| report.instant("updatedAt", updated));

	report.mirror("createdAt", created_ms, order.created_at_ms);
	report.mirror("promisedAt", promised_ms, order.promised_at_ms);
	report.mirror("updatedAt", updated_ms, order.updated_at_ms);
	if order.updated_at.is_none() && order.updated_at_ms.is_some() {
		report.push("updatedAtMs is set but updatedAt is missing".to_string());
	}

	report.code("kitchenStatus", &order.kitchen_status, KitchenStatus::ALL);
	report.code("paymentStatus", &order.payment_status, PaymentStatus::ALL);
	report.code("fulfillment", &order.fulfillment, Fulfillment::ALL);
	report.code("channel", &order.channel, Channel::ALL);

	if order.items.is_none() {
		report.push("items must be a list".to_string());
	}

	match &order.timestamps {
		None => report.push("timestamps must be an object".to_string()),
		Some(timestamps) => {
			for (slot, value) in timestamps.populated() {
				report.instant(&timestamp_field(slot), value);
			}
		},
	}

	if let Some(status @ (KitchenStatus::Handoff | KitchenStatus::Done)) =
		order.kitchen_status.known()
	{
		if !order.payment_cleared() {
			report.push(format!(
				"kitchenStatus {} requires paymentStatus PAID or flags.managerOverride",
				status
			));
		}
	}

	report.finish()
}

fn timestamp_field(slot: TimestampSlot) -> String {
	format!("timestamps.{}", slot.field_name())
}

/// Builds an order from raw JSON and validates it.
///
/// A field holding the wrong JSON type is reported by name and then treated
/// as missing, so the rest of the record is still checked and every problem
/// comes back together.
pub fn parse_order_v2(raw: Value) -> Result<OrderV2, ValidationErrors> {
	let Value::Object(mut fields) = raw else {
		return Err(ValidationErrors::single("order must be a JSON object"));
	};

	let mut shape_errors = Vec::new();
	let mut mistyped = Vec::new();

	for field in STRING_FIELDS {
		if fields.get(field).is_some_and(|v| !v.is_string()) {
			shape_errors.push(format!("{} must be a string", field));
			fields.remove(field);
			mistyped.push(field);
		}
	}
	if fields
		.get("updatedAt")
		.is_some_and(|v| !v.is_string() && !v.is_null())
	{
		shape_errors.push("updatedAt must be a string".to_string());
		fields.remove("updatedAt");
		mistyped.push("updatedAt");
	}
	for field in MILLIS_FIELDS {
		if fields
			.get(field)
			.is_some_and(|v| !v.is_i64() && !v.is_null())
		{
			shape_errors.push(format!("{} must be an integer", field));
			fields.remove(field);
			mistyped.push(field);
		}
	}

	match fields.get("items") {
		None | Some(Value::Null) => {},
		Some(Value::Array(items)) => {
			let bad: Vec<String> = items
				.iter()
				.enumerate()
				.filter(|(_, item)| serde_json::from_value::<OrderItem>((*item).clone()).is_err())
				.map(|(i, _)| format!("items[{}] must have a string name and a whole qty", i))
				.collect();
			if !bad.is_empty() {
				shape_errors.extend(bad);
				fields.remove("items");
				mistyped.push("items");
			}
		},
		Some(_) => {
			fields.remove("items");
		},
	}

	if fields
		.get("timestamps")
		.is_some_and(|ts| !ts.is_object() && !ts.is_null())
	{
		fields.remove("timestamps");
	} else if let Some(Value::Object(slots)) = fields.get_mut("timestamps") {
		check_timestamp_slots(slots, &mut shape_errors);
	}

	match fields.get("flags") {
		None | Some(Value::Null) => {},
		Some(Value::Object(flags)) => {
			if flags
				.get("managerOverride")
				.is_some_and(|v| !v.is_boolean() && !v.is_null())
			{
				shape_errors.push("flags.managerOverride must be a boolean".to_string());
				fields.remove("flags");
			}
		},
		Some(_) => {
			shape_errors.push("flags must be an object".to_string());
			fields.remove("flags");
		},
	}

	let order: OrderV2 = serde_json::from_value(Value::Object(fields))
		.map_err(|e| ValidationErrors::single(format!("malformed order: {}", e)))?;

	let mut errors = shape_errors;
	if let Err(found) = validate_order_v2(&order) {
		// A mistyped field is already reported; skip the echo of its default
		errors.extend(found.errors.into_iter().filter(|message| {
			!mistyped
				.iter()
				.any(|field| message.starts_with(&format!("{} ", field)))
		}));
	}

	if errors.is_empty() {
		Ok(order)
	} else {
		Err(ValidationErrors { errors })
	}
}

fn check_timestamp_slots(slots: &mut Map<String, Value>, errors: &mut Vec<String>) {
	for slot in TimestampSlot::ALL {
		let name = slot.field_name();
		if slots
			.get(name)
			.is_some_and(|v| !v.is_string() && !v.is_null())
		{
			errors.push(format!("{} must be a string", timestamp_field(slot)));
			slots.remove(name);
		}
	}
}

/// Fills `createdAtMs` and `promisedAtMs` from their ISO values when absent.
///
/// Mirrors that are already present are kept as they are, even if they
/// disagree; [`validate_order_v2`] reports that case.
pub fn normalize_order_v2(order: &OrderV2) -> OrderV2 {
	let mut normalized = order.clone();
	if normalized.created_at_ms.is_none() {
		normalized.created_at_ms = iso_to_ms(&normalized.created_at);
	}
	if normalized.promised_at_ms.is_none() {
		normalized.promised_at_ms = iso_to_ms(&normalized.promised_at);
	}
	normalized
}
