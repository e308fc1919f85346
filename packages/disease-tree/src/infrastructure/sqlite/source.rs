//! SQLite hierarchy and label source
//!
//! Reads the node table `(doid, name, def)`, the edge table
//! `(doid, parent_id)` and the assignment table `(ncats_name, did)`.
use rusqlite::{params, Connection, OptionalExtension};

use super::quote;
use crate::config::{JobConfig, TableNames, DEFAULT_CANONICAL_PREFIX};
use crate::domain::{HierarchySource, LabelSource};
use crate::error::{IndexError, Result};

/// Both source ports over one SQLite connection
pub struct SqliteSource<'c> {
    conn: &'c Connection,
    tables: TableNames,
    canonical_prefix: String,
}

impl<'c> SqliteSource<'c> {
    pub fn new(conn: &'c Connection, tables: TableNames) -> Self {
        Self {
            conn,
            tables,
            canonical_prefix: DEFAULT_CANONICAL_PREFIX.to_string(),
        }
    }

    pub fn from_config(conn: &'c Connection, config: &JobConfig) -> Self {
        Self::new(conn, config.tables.clone()).with_canonical_prefix(&config.canonical_prefix)
    }

    pub fn with_canonical_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.canonical_prefix = prefix.into();
        self
    }

    fn prefix_len(&self) -> i64 {
        self.canonical_prefix.chars().count() as i64
    }
}

impl HierarchySource for SqliteSource<'_> {
    fn node_details(&self, id: &str) -> Result<(String, Option<String>)> {
        let sql = format!(
            "SELECT name, def FROM {} WHERE doid = ?1",
            quote(&self.tables.nodes)
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?
            .ok_or_else(|| IndexError::not_found(id))
    }

    fn children(&self, id: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT doid FROM {} WHERE parent_id = ?1 ORDER BY doid",
            quote(&self.tables.edges)
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let children = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(children)
    }
}

impl LabelSource for SqliteSource<'_> {
    fn distinct_labels(&self) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT ncats_name FROM {} WHERE ncats_name IS NOT NULL",
            quote(&self.tables.assignments)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let labels = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(labels)
    }

    fn is_canonically_linked(&self, label: &str) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS (
                SELECT 1 FROM {} WHERE ncats_name = ?1 AND lower(substr(did, 1, ?2)) = lower(?3)
             )",
            quote(&self.tables.assignments)
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let linked: bool = stmt.query_row(
            params![label, self.prefix_len(), &self.canonical_prefix],
            |row| row.get(0),
        )?;
        Ok(linked)
    }

    fn unlinked_labels(&self) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT ncats_name FROM {}
             WHERE ncats_name IS NOT NULL
             GROUP BY ncats_name
             HAVING MAX(CASE WHEN lower(substr(did, 1, ?1)) = lower(?2) THEN 1 ELSE 0 END) = 0",
            quote(&self.tables.assignments)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let labels = stmt
            .query_map(params![self.prefix_len(), &self.canonical_prefix], |row| {
                row.get(0)
            })?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(labels)
    }
}
