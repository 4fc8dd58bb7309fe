//! Versioned order persistence.
//!
//! Wraps the storage service with order-specific reads and writes. Every read
//! returns the record version and every replacement names the version it
//! expects, so a write based on a stale read fails with
//! [`OrderStoreError::Conflict`] instead of clobbering a concurrent change.

use chrono::{DateTime, Utc};
use pizzaiolo_storage::{StorageError, StorageService, Versioned};
use pizzaiolo_types::{format_instant, Code, Fulfillment, OrderV2, StorageKey};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while reading or writing orders.
#[derive(Debug, Error)]
pub enum OrderStoreError {
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Order already exists: {0}")]
	AlreadyExists(String),
	#[error("Order {order_id} was modified concurrently (expected version {expected})")]
	Conflict { order_id: String, expected: u64 },
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Sets `updatedAt` and its millisecond mirror before a write.
pub fn mark_updated(order: &mut OrderV2, now: DateTime<Utc>) {
	order.updated_at = Some(format_instant(now));
	order.updated_at_ms = Some(now.timestamp_millis());
}

/// Reads and writes orders under the `orders` namespace.
pub struct OrderStore {
	storage: Arc<StorageService>,
}

impl OrderStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	async fn read(&self, order_id: &str) -> Result<Versioned<OrderV2>, StorageError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
	}

	/// Loads an order and the version it was read at.
	pub async fn get(&self, order_id: &str) -> Result<Versioned<OrderV2>, OrderStoreError> {
		self.read(order_id).await.map_err(|e| match e {
			StorageError::NotFound => OrderStoreError::NotFound(order_id.to_string()),
			other => OrderStoreError::Storage(other.to_string()),
		})
	}

	/// Stores a new order. Fails if an order with the same id exists.
	pub async fn insert(&self, order: &OrderV2) -> Result<u64, OrderStoreError> {
		self.storage
			.create(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.map_err(|e| match e {
				StorageError::Conflict { .. } => OrderStoreError::AlreadyExists(order.id.clone()),
				other => OrderStoreError::Storage(other.to_string()),
			})
	}

	/// Replaces an order if it is still at `expected_version`.
	///
	/// Returns the new version.
	pub async fn put(&self, order: &OrderV2, expected_version: u64) -> Result<u64, OrderStoreError> {
		self.storage
			.update(
				StorageKey::Orders.as_str(),
				&order.id,
				order,
				expected_version,
			)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => OrderStoreError::NotFound(order.id.clone()),
				StorageError::Conflict { .. } => OrderStoreError::Conflict {
					order_id: order.id.clone(),
					expected: expected_version,
				},
				other => OrderStoreError::Storage(other.to_string()),
			})
	}

	/// Lists orders that are not in a terminal status, optionally restricted
	/// to one fulfillment mode.
	///
	/// Records that no longer deserialize, or whose stored framing is damaged,
	/// are logged and skipped so that one corrupt document cannot stall the
	/// rest of the board.
	pub async fn list_open_orders(
		&self,
		fulfillment: Option<Fulfillment>,
	) -> Result<Vec<Versioned<OrderV2>>, OrderStoreError> {
		let ids = self
			.storage
			.list_ids(StorageKey::Orders.as_str())
			.await
			.map_err(|e| OrderStoreError::Storage(e.to_string()))?;

		let mut open = Vec::new();
		for id in ids {
			let stored = match self.read(&id).await {
				Ok(stored) => stored,
				// Removed between listing and reading
				Err(StorageError::NotFound) => continue,
				Err(StorageError::Serialization(e) | StorageError::Corrupt(e)) => {
					tracing::warn!(
						order_id = %id,
						error = %e,
						"Skipping unreadable order record"
					);
					continue;
				},
				Err(e) => return Err(OrderStoreError::Storage(e.to_string())),
			};

			let order = &stored.value;
			if !order.is_open() {
				continue;
			}
			if let Some(wanted) = fulfillment {
				if order.fulfillment != Code::Known(wanted) {
					continue;
				}
			}
			open.push(stored);
		}

		Ok(open)
	}
}
