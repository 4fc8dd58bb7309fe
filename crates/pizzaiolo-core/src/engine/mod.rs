//! Fulfillment engine that applies staff actions and automation to stored
//! orders.
//!
//! Every change follows the same cycle: read the order with its version,
//! decide with the pure state functions, write back conditioned on the
//! version. Staff actions that lose a write race are reported as conflicts so
//! the person can look at the fresh order before retrying. The expiry sweep
//! retries on its own since its decision is re-evaluated from scratch.

pub mod lifecycle;

use crate::automation::{AutoExpireRule, ExpirySweeper, SweepReport};
use crate::clock::Clock;
use crate::state::{
	apply_transition, can_transition, mark_updated, OrderStore, OrderStoreError, TransitionDenied,
};
use crate::validation::{normalize_order_v2, parse_order_v2, ValidationErrors};
use pizzaiolo_config::Config;
use pizzaiolo_storage::{StorageService, Versioned};
use pizzaiolo_types::{Code, Fulfillment, KitchenStatus, OrderV2};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Outcome of a refused or failed transition request.
#[derive(Debug, Error)]
pub enum TransitionError {
	#[error("Order not found: {0}")]
	NotFound(String),
	/// The state machine refused the move.
	#[error("{0}")]
	Denied(#[from] TransitionDenied),
	/// The order changed between read and write.
	#[error("Order {0} was modified concurrently, reload and retry")]
	Conflict(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<OrderStoreError> for TransitionError {
	fn from(err: OrderStoreError) -> Self {
		match err {
			OrderStoreError::NotFound(id) => TransitionError::NotFound(id),
			OrderStoreError::Conflict { order_id, .. } => TransitionError::Conflict(order_id),
			other => TransitionError::Storage(other.to_string()),
		}
	}
}

/// Why a new order was not stored.
#[derive(Debug, Error)]
pub enum CreateOrderError {
	#[error(transparent)]
	Invalid(#[from] ValidationErrors),
	#[error("Order already exists: {0}")]
	AlreadyExists(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<OrderStoreError> for CreateOrderError {
	fn from(err: OrderStoreError) -> Self {
		match err {
			OrderStoreError::AlreadyExists(id) => CreateOrderError::AlreadyExists(id),
			other => CreateOrderError::Storage(other.to_string()),
		}
	}
}

/// Applies staff actions and automation to stored orders.
#[derive(Clone)]
pub struct FulfillmentEngine {
	pub(crate) config: Config,
	pub(crate) orders: Arc<OrderStore>,
	pub(crate) clock: Arc<dyn Clock>,
	pub(crate) sweeper: Arc<ExpirySweeper>,
}

impl FulfillmentEngine {
	pub fn new(config: Config, storage: Arc<StorageService>, clock: Arc<dyn Clock>) -> Self {
		let orders = Arc::new(OrderStore::new(storage));
		let sweeper = Arc::new(ExpirySweeper::new(
			orders.clone(),
			clock.clone(),
			AutoExpireRule::from_minutes(config.automation.expiry_grace_minutes),
			config.automation.max_conflict_retries,
		));

		Self {
			config,
			orders,
			clock,
			sweeper,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn orders(&self) -> &Arc<OrderStore> {
		&self.orders
	}

	/// Validates, normalizes and stores a new order.
	///
	/// `updatedAt` is stamped with the current time.
	pub async fn create_order(
		&self,
		raw: serde_json::Value,
	) -> Result<Versioned<OrderV2>, CreateOrderError> {
		let parsed = parse_order_v2(raw)?;
		let mut order = normalize_order_v2(&parsed);
		mark_updated(&mut order, self.clock.now());

		let version = self.orders.insert(&order).await?;
		tracing::info!(
			order_id = %order.id,
			kitchen_status = %order.kitchen_status,
			fulfillment = %order.fulfillment,
			"Order created"
		);
		Ok(Versioned::new(order, version))
	}

	pub async fn get_order(&self, order_id: &str) -> Result<Versioned<OrderV2>, OrderStoreError> {
		self.orders.get(order_id).await
	}

	pub async fn list_open_orders(
		&self,
		fulfillment: Option<Fulfillment>,
	) -> Result<Vec<Versioned<OrderV2>>, OrderStoreError> {
		self.orders.list_open_orders(fulfillment).await
	}

	/// Moves an order to `target` on behalf of `actor`.
	///
	/// Reads the order, checks the move with the state machine, applies it
	/// and writes it back conditioned on the version that was read. A refused
	/// move comes back as [`TransitionError::Denied`] with the reason to show
	/// staff; losing a race comes back as [`TransitionError::Conflict`] and
	/// nothing is written.
	pub async fn request_transition(
		&self,
		order_id: &str,
		target: impl Into<Code<KitchenStatus>>,
		actor: &str,
	) -> Result<Versioned<OrderV2>, TransitionError> {
		let target = target.into();
		let current = self.orders.get(order_id).await?;

		let transition = match can_transition(&current.value, target.clone()) {
			Ok(transition) => transition,
			Err(reason) => {
				tracing::info!(
					order_id = %order_id,
					actor,
					from = %current.value.kitchen_status,
					to = %target,
					reason = %reason,
					"Transition refused"
				);
				return Err(reason.into());
			},
		};

		let now = self.clock.now();
		let mut updated = apply_transition(&current.value, transition.to, now);
		mark_updated(&mut updated, now);

		let version = match self.orders.put(&updated, current.version).await {
			Ok(version) => version,
			Err(e) => {
				tracing::warn!(
					order_id = %order_id,
					actor,
					from = %transition.from,
					to = %transition.to,
					error = %e,
					"Transition not saved"
				);
				return Err(e.into());
			},
		};

		tracing::info!(
			order_id = %order_id,
			actor,
			from = %transition.from,
			to = %transition.to,
			"Order transitioned"
		);
		Ok(Versioned::new(updated, version))
	}

	/// Runs one expiry sweep over open pickup orders.
	pub async fn sweep_once(&self) -> Result<SweepReport, OrderStoreError> {
		self.sweeper.sweep_once().await
	}

	/// Main loop: sweeps on the configured interval until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		let automation = &self.config.automation;
		if !automation.enabled {
			tracing::info!("Automation disabled, expiry sweep not started");
			return tokio::signal::ctrl_c()
				.await
				.map_err(|e| EngineError::Service(e.to_string()));
		}

		let mut interval =
			tokio::time::interval(Duration::from_secs(automation.sweep_interval_seconds));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = interval.tick() => {
					if let Err(e) = self.sweep_once().await {
						tracing::error!(error = %e, "Expiry sweep failed");
					}
				}
				_ = tokio::signal::ctrl_c() => {
					break;
				}
			}
		}

		Ok(())
	}
}
