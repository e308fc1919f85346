//! SQLite adapters for the hierarchy sources and the index store

mod source;
mod store;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;

pub use source::SqliteSource;
pub use store::SqliteIndexStore;

/// Open the warehouse database.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(30))?;
    Ok(conn)
}

/// Double-quote an identifier that has already passed config validation.
pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
