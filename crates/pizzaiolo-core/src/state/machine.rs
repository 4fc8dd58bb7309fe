//! Kitchen status state machine.
//!
//! Orders move forward through
//! `NEW -> QUEUED -> PREPPING -> READY -> HANDOFF -> DONE`, may be canceled
//! from any active status before hand-off, and may be expired by automation.
//! `DONE`, `CANCELED` and `EXPIRED` are terminal.
//!
//! [`can_transition`] is the guard and never panics: refusals are ordinary
//! values the caller branches on. [`apply_transition`] performs an allowed
//! transition and treats a refused one as a caller bug.

use chrono::{DateTime, Utc};
use pizzaiolo_types::{format_instant, Code, KitchenStatus, OrderV2};
use thiserror::Error;

/// Why a transition was refused.
///
/// The display strings are stable and shown to staff as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionDenied {
	#[error("invalid current status")]
	InvalidCurrentStatus,
	#[error("invalid target status")]
	InvalidTargetStatus,
	#[error("terminal status")]
	TerminalStatus,
	#[error("transition not permitted")]
	NotPermitted,
	#[error("payment required before hand-off")]
	PaymentRequiredBeforeHandoff,
	#[error("payment required before completion")]
	PaymentRequiredBeforeCompletion,
}

/// An allowed move between two statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
	pub from: KitchenStatus,
	pub to: KitchenStatus,
}

/// Successor set of every status.
///
/// Exhaustive on purpose: adding a status does not compile until its
/// successors are listed here.
pub fn allowed_next(from: KitchenStatus) -> &'static [KitchenStatus] {
	use KitchenStatus::*;

	match from {
		New => &[Queued, Canceled],
		Queued => &[Prepping, Canceled],
		Prepping => &[Ready, Canceled],
		Ready => &[Handoff, Canceled],
		Handoff => &[Done],
		Done | Canceled | Expired => &[],
	}
}

/// Checks whether `order` may move to `next`.
///
/// Checks run in a fixed order and the first failure wins: recognized current
/// status, recognized target, not terminal, listed in [`allowed_next`], then
/// the payment gates on hand-off and completion. `flags.managerOverride`
/// lifts both payment gates.
pub fn can_transition(
	order: &OrderV2,
	next: impl Into<Code<KitchenStatus>>,
) -> Result<Transition, TransitionDenied> {
	let from = order
		.kitchen_status
		.known()
		.ok_or(TransitionDenied::InvalidCurrentStatus)?;
	let to = next
		.into()
		.known()
		.ok_or(TransitionDenied::InvalidTargetStatus)?;

	if from.is_terminal() {
		return Err(TransitionDenied::TerminalStatus);
	}
	if !allowed_next(from).contains(&to) {
		return Err(TransitionDenied::NotPermitted);
	}
	if from == KitchenStatus::Ready && to == KitchenStatus::Handoff && !order.payment_cleared() {
		return Err(TransitionDenied::PaymentRequiredBeforeHandoff);
	}
	if to == KitchenStatus::Done && !order.payment_cleared() {
		return Err(TransitionDenied::PaymentRequiredBeforeCompletion);
	}

	Ok(Transition { from, to })
}

/// Returns a copy of `order` in `status` with that status' timestamp slot
/// written, unless the slot is already populated.
pub(crate) fn enter_status(order: &OrderV2, status: KitchenStatus, now: DateTime<Utc>) -> OrderV2 {
	let mut next = order.clone();
	next.kitchen_status = Code::Known(status);
	if let Some(slot) = status.timestamp_slot() {
		next.timestamps
			.get_or_insert_with(Default::default)
			.record(slot, format_instant(now));
	}
	next
}

/// Applies an allowed transition, or returns the refusal.
pub fn try_apply_transition(
	order: &OrderV2,
	next: KitchenStatus,
	now: DateTime<Utc>,
) -> Result<OrderV2, TransitionDenied> {
	can_transition(order, next)?;
	Ok(enter_status(order, next, now))
}

/// Applies a transition the caller has already checked with
/// [`can_transition`].
///
/// The returned order has `kitchenStatus = next` and exactly the timestamp
/// slot mapped to `next` set to `now`. Existing timestamps and
/// `paymentStatus` are never touched.
///
/// # Panics
///
/// Panics if [`can_transition`] refuses the move. Reaching that means the
/// caller skipped the guard.
pub fn apply_transition(order: &OrderV2, next: KitchenStatus, now: DateTime<Utc>) -> OrderV2 {
	match try_apply_transition(order, next, now) {
		Ok(updated) => updated,
		Err(denied) => panic!(
			"apply_transition called with a refused transition {} -> {} on order {}: {}",
			order.kitchen_status, next, order.id, denied
		),
	}
}

/// [`apply_transition`] at the current wall-clock instant.
///
/// # Panics
///
/// Same as [`apply_transition`].
pub fn apply_transition_now(order: &OrderV2, next: KitchenStatus) -> OrderV2 {
	apply_transition(order, next, Utc::now())
}
