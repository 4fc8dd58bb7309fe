//! Automation rules applied without a staff action.

pub mod expiry;
pub mod sweeper;

pub use expiry::{auto_expire, AutoExpireRule, ExpiryOutcome, DEFAULT_GRACE_MINUTES};
pub use sweeper::{ExpirySweeper, SweepReport};
