//! Process-wide tracing setup for hosts embedding the store.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize with an explicit default filter (used when `RUST_LOG` is unset).
pub fn init_with_default(filter: &str) {
    tracing::init_with_default(filter);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
