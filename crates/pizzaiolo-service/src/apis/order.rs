//! Order board API.
//!
//! Thin handlers over the fulfillment engine: they translate request bodies
//! into engine calls and engine errors into [`APIError`] responses.

use pizzaiolo_core::{
	CreateOrderError, FulfillmentEngine, OrderStoreError, TransitionDenied, TransitionError,
};
use pizzaiolo_storage::Versioned;
use pizzaiolo_types::{
	APIError, Code, Fulfillment, KitchenStatus, ListOrdersQuery, ListOrdersResponse,
	OrderEnvelope, OrderV2, TransitionRequest,
};
use thiserror::Error;
use tracing::warn;

/// Errors raised by the order endpoints before they become HTTP responses.
#[derive(Debug, Error)]
pub enum OrderApiError {
	#[error(transparent)]
	Create(#[from] CreateOrderError),
	#[error(transparent)]
	Transition(#[from] TransitionError),
	#[error(transparent)]
	Store(#[from] OrderStoreError),
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
}

impl From<OrderApiError> for APIError {
	fn from(err: OrderApiError) -> Self {
		let message = err.to_string();
		match err {
			OrderApiError::Create(CreateOrderError::Invalid(errors)) => APIError::BadRequest {
				error_type: "INVALID_ORDER".to_string(),
				message,
				details: Some(serde_json::json!(errors.errors)),
			},
			OrderApiError::Create(CreateOrderError::AlreadyExists(_)) => APIError::Conflict {
				error_type: "ORDER_EXISTS".to_string(),
				message,
				retry_after: None,
			},
			OrderApiError::Transition(TransitionError::Denied(
				TransitionDenied::InvalidTargetStatus,
			)) => APIError::BadRequest {
				error_type: "INVALID_TARGET".to_string(),
				message,
				details: None,
			},
			OrderApiError::Transition(TransitionError::Denied(_)) => {
				APIError::UnprocessableEntity {
					error_type: "TRANSITION_DENIED".to_string(),
					message,
				}
			},
			OrderApiError::Transition(TransitionError::Conflict(_))
			| OrderApiError::Store(OrderStoreError::Conflict { .. }) => APIError::Conflict {
				error_type: "CONFLICT".to_string(),
				message,
				retry_after: Some(0),
			},
			OrderApiError::Transition(TransitionError::NotFound(_))
			| OrderApiError::Store(OrderStoreError::NotFound(_)) => APIError::NotFound {
				error_type: "ORDER_NOT_FOUND".to_string(),
				message,
			},
			OrderApiError::InvalidRequest(_) => APIError::BadRequest {
				error_type: "INVALID_REQUEST".to_string(),
				message,
				details: None,
			},
			OrderApiError::Create(_) | OrderApiError::Transition(_) | OrderApiError::Store(_) => {
				APIError::InternalServerError {
					error_type: "INTERNAL_ERROR".to_string(),
					message,
				}
			},
		}
	}
}

fn envelope(stored: Versioned<OrderV2>) -> OrderEnvelope {
	OrderEnvelope {
		order: stored.value,
		version: stored.version,
	}
}

/// POST /api/orders
pub async fn create_order(
	raw: serde_json::Value,
	engine: &FulfillmentEngine,
) -> Result<OrderEnvelope, OrderApiError> {
	let created = engine.create_order(raw).await.inspect_err(|e| {
		warn!(error = %e, "Order rejected");
	})?;
	Ok(envelope(created))
}

/// GET /api/orders/{id}
pub async fn get_order_by_id(
	order_id: &str,
	engine: &FulfillmentEngine,
) -> Result<OrderEnvelope, OrderApiError> {
	Ok(envelope(engine.get_order(order_id).await?))
}

/// GET /api/orders
pub async fn list_open_orders(
	query: ListOrdersQuery,
	engine: &FulfillmentEngine,
) -> Result<ListOrdersResponse, OrderApiError> {
	let fulfillment = query
		.fulfillment
		.as_deref()
		.map(|raw| {
			raw.parse::<Fulfillment>()
				.map_err(|e| OrderApiError::InvalidRequest(e.to_string()))
		})
		.transpose()?;

	let orders = engine.list_open_orders(fulfillment).await?;
	Ok(ListOrdersResponse {
		orders: orders.into_iter().map(envelope).collect(),
	})
}

/// POST /api/orders/{id}/transition
pub async fn transition_order(
	order_id: &str,
	request: TransitionRequest,
	engine: &FulfillmentEngine,
) -> Result<OrderEnvelope, OrderApiError> {
	let actor = request.actor.trim();
	if actor.is_empty() {
		return Err(OrderApiError::InvalidRequest(
			"actor is required".to_string(),
		));
	}

	let target = Code::<KitchenStatus>::parse(&request.target);
	let updated = engine.request_transition(order_id, target, actor).await?;
	Ok(envelope(updated))
}
