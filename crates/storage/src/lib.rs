//! Key/value persistence for the store.
//!
//! Stores are namespaced (`cache`, `cart`); values are JSON text. Writes go
//! through `PersistWriter`, a background task that applies them in order and
//! never reports failures back to the mutation that caused them.

pub mod error;
pub mod json;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod writer;

pub use error::StorageError;
pub use json::load_or_default;
pub use memory::InMemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;
pub use store::KeyValueStore;
pub use writer::PersistWriter;
