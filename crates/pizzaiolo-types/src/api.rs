//! API types for the order board HTTP API.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::OrderV2;

/// Body of `POST /api/orders/{id}/transition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
	/// Requested kitchen status, e.g. `"QUEUED"`.
	pub target: String,
	/// Who asked, e.g. `"staff:ana"` or `"kiosk-2"`. Recorded in logs.
	pub actor: String,
}

/// An order together with the store version it was read at or written as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEnvelope {
	pub order: OrderV2,
	pub version: u64,
}

/// Response of `GET /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersResponse {
	pub orders: Vec<OrderEnvelope>,
}

/// Query string of `GET /api/orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOrdersQuery {
	/// Restrict to `PICKUP` or `DELIVERY`.
	pub fulfillment: Option<String>,
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Machine readable code, e.g. `TRANSITION_DENIED`.
	pub error: String,
	/// Human-readable description.
	pub message: String,
	/// Additional context, such as the list of validation failures.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds.
	#[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Structured API error with its HTTP status.
#[derive(Debug)]
pub enum APIError {
	/// Malformed request or record (400).
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// No such order (404).
	NotFound { error_type: String, message: String },
	/// Write lost an optimistic concurrency race; re-read and retry (409).
	Conflict {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Business refusal, e.g. payment required before hand-off (422).
	UnprocessableEntity { error_type: String, message: String },
	/// Anything else (500).
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Converts to the JSON body.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
				retry_after: None,
			},
			APIError::Conflict {
				error_type,
				message,
				retry_after,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: *retry_after,
			},
			APIError::NotFound {
				error_type,
				message,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_response_shape() {
		let err = APIError::Conflict {
			error_type: "CONFLICT".to_string(),
			message: "order ord_1 changed".to_string(),
			retry_after: Some(0),
		};
		assert_eq!(err.status_code(), 409);

		let body = serde_json::to_value(err.to_error_response()).unwrap();
		assert_eq!(body["error"], "CONFLICT");
		assert_eq!(body["retryAfter"], 0);
		assert!(body.get("details").is_none());
	}

	#[test]
	fn test_transition_request_from_json() {
		let req: TransitionRequest =
			serde_json::from_str(r#"{"target":"QUEUED","actor":"staff:ana"}"#).unwrap();
		assert_eq!(req.target, "QUEUED");
		assert_eq!(req.actor, "staff:ana");
	}
}
