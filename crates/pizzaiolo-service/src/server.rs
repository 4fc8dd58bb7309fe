//! HTTP server for the order board API.
//!
//! Staff devices and the storefront talk to the engine through these routes.
//! Everything except `/health` is nested under `/api`.

use axum::{
	extract::{DefaultBodyLimit, Path, Query, State},
	http::{HeaderValue, StatusCode},
	response::Json,
	routing::{get, post},
	Router,
};
use pizzaiolo_config::ApiConfig;
use pizzaiolo_core::FulfillmentEngine;
use pizzaiolo_types::{
	APIError, ListOrdersQuery, ListOrdersResponse, OrderEnvelope, TransitionRequest,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<FulfillmentEngine>,
}

/// Builds the router with middleware configured from `api_config`.
pub fn build_router(api_config: &ApiConfig, engine: Arc<FulfillmentEngine>) -> Router {
	let cors = match &api_config.cors {
		Some(cors) => {
			let origins: Vec<HeaderValue> = cors
				.allowed_origins
				.iter()
				.filter_map(|origin| match origin.parse() {
					Ok(value) => Some(value),
					Err(_) => {
						tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
						None
					},
				})
				.collect();
			CorsLayer::new()
				.allow_origin(origins)
				.allow_methods(Any)
				.allow_headers(Any)
		},
		None => CorsLayer::permissive(),
	};

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_create_order).get(handle_list_orders))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/transition", post(handle_transition)),
		)
		.route("/health", get(handle_health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors)
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// Starts the HTTP server and serves until it fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<FulfillmentEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(&api_config, engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order board API listening on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn handle_health() -> Json<Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

/// Handles POST /api/orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	Json(raw): Json<Value>,
) -> Result<(StatusCode, Json<OrderEnvelope>), APIError> {
	let created = crate::apis::order::create_order(raw, &state.engine).await?;
	Ok((StatusCode::CREATED, Json(created)))
}

/// Handles GET /api/orders requests.
async fn handle_list_orders(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, APIError> {
	match crate::apis::order::list_open_orders(query, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Listing orders failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderEnvelope>, APIError> {
	Ok(Json(
		crate::apis::order::get_order_by_id(&id, &state.engine).await?,
	))
}

/// Handles POST /api/orders/{id}/transition requests.
async fn handle_transition(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<TransitionRequest>,
) -> Result<Json<OrderEnvelope>, APIError> {
	Ok(Json(
		crate::apis::order::transition_order(&id, request, &state.engine).await?,
	))
}
