//! Utility functions for instant conversions.

pub mod conversion;

pub use conversion::{format_instant, iso_to_ms, ms_to_iso, parse_instant};
