//! Periodic expiry sweep over open pickup orders.
//!
//! Each pass lists open pickup orders, evaluates the expiry rule against the
//! clock and writes expired orders back with the version they were read at.
//! When a staff action lands between the read and the write, the sweep
//! re-reads and re-evaluates the fresh record a bounded number of times.

use super::expiry::{AutoExpireRule, ExpiryOutcome};
use crate::clock::Clock;
use crate::state::{mark_updated, OrderStore, OrderStoreError};
use pizzaiolo_storage::Versioned;
use pizzaiolo_types::{Fulfillment, KitchenStatus, OrderV2};
use std::sync::Arc;

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Open pickup orders looked at.
	pub examined: usize,
	/// Orders moved to `EXPIRED`.
	pub expired: usize,
	/// Orders skipped after running out of conflict retries.
	pub conflicts: usize,
	/// Orders skipped because of a storage error.
	pub failed: usize,
}

pub struct ExpirySweeper {
	orders: Arc<OrderStore>,
	clock: Arc<dyn Clock>,
	rule: AutoExpireRule,
	max_conflict_retries: u32,
}

impl ExpirySweeper {
	pub fn new(
		orders: Arc<OrderStore>,
		clock: Arc<dyn Clock>,
		rule: AutoExpireRule,
		max_conflict_retries: u32,
	) -> Self {
		Self {
			orders,
			clock,
			rule,
			max_conflict_retries,
		}
	}

	/// Runs one pass. Fails only if the open orders cannot be listed.
	pub async fn sweep_once(&self) -> Result<SweepReport, OrderStoreError> {
		let open = self
			.orders
			.list_open_orders(Some(Fulfillment::Pickup))
			.await?;

		let mut report = SweepReport {
			examined: open.len(),
			..Default::default()
		};

		for stored in open {
			let order_id = stored.value.id.clone();
			match self.expire_with_retries(stored).await {
				Ok(true) => report.expired += 1,
				Ok(false) => {},
				Err(OrderStoreError::Conflict { .. }) => {
					tracing::warn!(
						order_id = %order_id,
						retries = self.max_conflict_retries,
						"Giving up on expiring order after repeated conflicts"
					);
					report.conflicts += 1;
				},
				Err(e) => {
					tracing::error!(
						order_id = %order_id,
						error = %e,
						"Failed to expire order"
					);
					report.failed += 1;
				},
			}
		}

		if report.expired > 0 || report.conflicts > 0 || report.failed > 0 {
			tracing::info!(
				examined = report.examined,
				expired = report.expired,
				conflicts = report.conflicts,
				failed = report.failed,
				"Expiry sweep finished"
			);
		} else {
			tracing::debug!(examined = report.examined, "Expiry sweep found nothing to do");
		}

		Ok(report)
	}

	/// Returns whether the order was expired by this call.
	async fn expire_with_retries(
		&self,
		mut current: Versioned<OrderV2>,
	) -> Result<bool, OrderStoreError> {
		let mut attempt = 0;
		loop {
			let now = self.clock.now();
			let mut expired = match self.rule.evaluate(&current.value, now) {
				ExpiryOutcome::Unchanged(_) => return Ok(false),
				ExpiryOutcome::Expired(order) => order,
			};
			mark_updated(&mut expired, now);

			match self.orders.put(&expired, current.version).await {
				Ok(_) => {
					tracing::info!(
						order_id = %expired.id,
						actor = "automation",
						from = %current.value.kitchen_status,
						to = %KitchenStatus::Expired,
						reason = "unpaid pickup past grace period",
						"Order expired"
					);
					return Ok(true);
				},
				Err(OrderStoreError::Conflict { .. }) if attempt < self.max_conflict_retries => {
					attempt += 1;
					tracing::debug!(
						order_id = %expired.id,
						attempt,
						"Order changed during sweep, re-reading"
					);
					current = match self.orders.get(&expired.id).await {
						Ok(fresh) => fresh,
						// Deleted concurrently
						Err(OrderStoreError::NotFound(_)) => return Ok(false),
						Err(e) => return Err(e),
					};
				},
				// Deleted between listing and writing
				Err(OrderStoreError::NotFound(_)) => return Ok(false),
				Err(e) => return Err(e),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::FixedClock;
	use crate::test_support::{at, order_with_id};
	use async_trait::async_trait;
	use pizzaiolo_storage::implementations::memory::MemoryStorage;
	use pizzaiolo_storage::{StorageError, StorageInterface, StorageService};
	use pizzaiolo_types::{Code, ConfigSchema, PaymentStatus};
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// Lets another writer land just before each of the next `interfere`
	/// writes, applying `concurrent` to the stored order.
	struct RacingStorage {
		inner: MemoryStorage,
		interfere: Arc<AtomicUsize>,
		concurrent: fn(&mut OrderV2),
	}

	#[async_trait]
	impl StorageInterface for RacingStorage {
		async fn get_bytes(&self, key: &str) -> Result<Versioned<Vec<u8>>, StorageError> {
			self.inner.get_bytes(key).await
		}

		async fn compare_and_set(
			&self,
			key: &str,
			value: Vec<u8>,
			expected: Option<u64>,
		) -> Result<u64, StorageError> {
			let pending = self.interfere.load(Ordering::SeqCst);
			if pending > 0 && expected.is_some() {
				self.interfere.store(pending - 1, Ordering::SeqCst);
				let stored = self.inner.get_bytes(key).await?;
				let mut other: OrderV2 = serde_json::from_slice(&stored.value).unwrap();
				(self.concurrent)(&mut other);
				self.inner
					.compare_and_set(key, serde_json::to_vec(&other).unwrap(), Some(stored.version))
					.await?;
			}
			self.inner.compare_and_set(key, value, expected).await
		}

		async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
			self.inner.list_keys(prefix).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	async fn sweeper_with(
		concurrent: fn(&mut OrderV2),
		interfere: usize,
		retries: u32,
	) -> (ExpirySweeper, Arc<OrderStore>) {
		let remaining = Arc::new(AtomicUsize::new(0));
		let storage = Arc::new(StorageService::new(Box::new(RacingStorage {
			inner: MemoryStorage::new(),
			interfere: remaining.clone(),
			concurrent,
		})));
		let orders = Arc::new(OrderStore::new(storage));
		orders.insert(&order_with_id("ord_1")).await.unwrap();
		remaining.store(interfere, Ordering::SeqCst);

		let clock = Arc::new(FixedClock::new(at("2026-01-15T11:00:01.000Z")));
		let sweeper = ExpirySweeper::new(orders.clone(), clock, AutoExpireRule::default(), retries);
		(sweeper, orders)
	}

	#[tokio::test]
	async fn test_payment_landing_mid_sweep_wins() {
		let (sweeper, orders) = sweeper_with(
			|order| order.payment_status = Code::Known(PaymentStatus::Paid),
			1,
			3,
		)
		.await;

		let report = sweeper.sweep_once().await.unwrap();
		assert_eq!(report.expired, 0);
		assert_eq!(report.conflicts, 0);

		let stored = orders.get("ord_1").await.unwrap();
		assert_eq!(stored.version, 2);
		assert_eq!(stored.value.payment_status, Code::Known(PaymentStatus::Paid));
		assert_eq!(stored.value.kitchen_status, Code::Known(KitchenStatus::New));
	}

	#[tokio::test]
	async fn test_unrelated_change_is_retried() {
		let (sweeper, orders) = sweeper_with(
			|order| order.channel = Code::Known(pizzaiolo_types::Channel::Phone),
			2,
			3,
		)
		.await;

		assert_eq!(sweeper.sweep_once().await.unwrap().expired, 1);

		let stored = orders.get("ord_1").await.unwrap().value;
		assert_eq!(stored.kitchen_status, Code::Known(KitchenStatus::Expired));
		assert_eq!(
			stored.channel,
			Code::Known(pizzaiolo_types::Channel::Phone)
		);
	}

	#[tokio::test]
	async fn test_gives_up_after_retries() {
		let (sweeper, orders) = sweeper_with(|_| {}, 10, 2).await;

		let report = sweeper.sweep_once().await.unwrap();
		assert_eq!(
			report,
			SweepReport {
				examined: 1,
				expired: 0,
				conflicts: 1,
				failed: 0
			}
		);
		assert_eq!(
			orders.get("ord_1").await.unwrap().value.kitchen_status,
			Code::Known(KitchenStatus::New)
		);
	}
}
