//! Infrastructure layer - Source and store adapters

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryHierarchy;

#[cfg(feature = "sqlite")]
pub use sqlite::{open_database, SqliteIndexStore, SqliteSource};
