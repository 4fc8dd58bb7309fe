//! Order state: the kitchen status machine and versioned order persistence.
//!
//! The machine in [`machine`] is pure and knows nothing about storage. The
//! store in [`order`] reads and writes orders with their version so that
//! callers can detect concurrent modification.

pub mod machine;
pub mod order;

pub use machine::{
	allowed_next, apply_transition, apply_transition_now, can_transition, try_apply_transition,
	Transition, TransitionDenied,
};
pub use order::{mark_updated, OrderStore, OrderStoreError};
