//! Common types for the pizzaiolo order fulfillment system.
//!
//! This crate holds the order record and its enumerations, the HTTP wire types,
//! storage namespaces and the small configuration validation framework shared by
//! every other crate in the workspace.

/// HTTP request and response types.
pub mod api;
/// Order record, kitchen/payment enumerations and timestamp slots.
pub mod order;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// Time conversions and display helpers.
pub mod utils;
/// Configuration validation types for backend configuration tables.
pub mod validation;

pub use api::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{format_instant, iso_to_ms, ms_to_iso, parse_instant};
pub use validation::*;
