//! Storage namespaces for the fulfillment system.

/// Namespaces under which records are stored.
///
/// Keys are built as `"{namespace}:{id}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order records.
	Orders,
}

impl StorageKey {
	/// Returns the namespace string.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
		}
	}
}
