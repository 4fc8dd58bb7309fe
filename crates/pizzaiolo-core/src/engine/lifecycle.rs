//! Startup and shutdown of the fulfillment engine.

use super::{EngineError, FulfillmentEngine};

impl FulfillmentEngine {
	/// Checks that storage is reachable and reports what is on the board.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let open = self
			.orders
			.list_open_orders(None)
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;

		tracing::info!(
			service_id = %self.config.service.id,
			open_orders = open.len(),
			automation = self.config.automation.enabled,
			"Initializing fulfillment engine"
		);
		Ok(())
	}

	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!(service_id = %self.config.service.id, "Shutting down fulfillment engine");
		Ok(())
	}
}
