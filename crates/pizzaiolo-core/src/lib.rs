//! Order fulfillment core for the pizzaiolo service.
//!
//! Holds the kitchen status state machine, order validation, the automatic
//! expiry rule and the engine that applies them to stored orders with
//! optimistic concurrency. The state and rule functions are pure: they take
//! `now` as an argument and return new records, leaving persistence to
//! [`engine::FulfillmentEngine`].

pub mod automation;
pub mod builder;
pub mod clock;
pub mod engine;
pub mod state;
pub mod validation;

pub use automation::{auto_expire, AutoExpireRule, ExpiryOutcome, SweepReport};
pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{CreateOrderError, EngineError, FulfillmentEngine, TransitionError};
pub use state::{
	apply_transition, apply_transition_now, can_transition, try_apply_transition, OrderStore,
	OrderStoreError, TransitionDenied,
};
pub use validation::{
	normalize_order_v2, parse_order_v2, validate_order_v2, ValidationErrors, MAX_ORDER_ID_BYTES,
};

#[cfg(test)]
pub(crate) mod test_support {
	use chrono::{DateTime, Utc};
	use pizzaiolo_types::{parse_instant, OrderV2};
	use serde_json::json;

	pub fn at(iso: &str) -> DateTime<Utc> {
		parse_instant(iso).unwrap()
	}

	/// A fresh unpaid pickup placed at 09:30 and promised for 10:00.
	pub fn wire_order() -> serde_json::Value {
		json!({
			"id": "ord_1",
			"createdAt": "2026-01-15T09:30:00.000Z",
			"promisedAt": "2026-01-15T10:00:00.000Z",
			"kitchenStatus": "NEW",
			"paymentStatus": "UNPAID",
			"fulfillment": "PICKUP",
			"channel": "WEB",
			"items": [{ "name": "Margherita", "qty": 1 }],
			"timestamps": {}
		})
	}

	pub fn order() -> OrderV2 {
		serde_json::from_value(wire_order()).unwrap()
	}

	pub fn order_with_id(id: &str) -> OrderV2 {
		let mut order = order();
		order.id = id.to_string();
		order
	}
}
