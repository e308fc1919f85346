//! SQLite nested-set index store
//!
//! A new generation is written to `<index>_staging`, checked, then promoted
//! in a single transaction that drops the old table, renames staging into
//! place and rebuilds the `doid` lookup index. Readers see either the old
//! table or the new one, never a partially filled one.
use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::{debug, info, warn};

use super::quote;
use crate::config::{JobConfig, TableNames, DEFAULT_BATCH_SIZE};
use crate::domain::{interval_checksum, Generation, IndexQuery, IndexStore, IntervalRecord};
use crate::error::{IndexError, Result};

/// Bind-parameter ceiling of the bundled SQLite
const SQLITE_MAX_VARIABLES: usize = 32_766;
const COLUMNS_PER_ROW: usize = 5;

/// Nested-set index persisted in SQLite
pub struct SqliteIndexStore<'c> {
    conn: &'c Connection,
    tables: TableNames,
    batch_size: usize,
}

impl<'c> SqliteIndexStore<'c> {
    pub fn new(conn: &'c Connection, tables: TableNames) -> Self {
        Self {
            conn,
            tables,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn from_config(conn: &'c Connection, config: &JobConfig) -> Self {
        Self::new(conn, config.tables.clone()).with_batch_size(config.batch_size)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Rows per INSERT statement, capped by the bind-parameter limit.
    fn rows_per_statement(&self) -> usize {
        self.batch_size.min(SQLITE_MAX_VARIABLES / COLUMNS_PER_ROW)
    }

    /// Every published record ordered by `left`.
    pub fn published_records(&self) -> Result<Vec<IntervalRecord>> {
        let sql = format!(
            "SELECT lft, rght, doid, name, def FROM {} ORDER BY lft",
            quote(&self.tables.index)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], read_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Metadata of the most recently promoted generation, if any.
    pub fn latest_generation(&self) -> Result<Option<Generation>> {
        if !self.table_exists(&self.tables.meta())? {
            return Ok(None);
        }

        let sql = format!(
            "SELECT generation, built_at, record_count, canonical_count, orphan_count, checksum
             FROM {} ORDER BY generation DESC LIMIT 1",
            quote(&self.tables.meta())
        );
        let generation = self
            .conn
            .query_row(&sql, [], |row| {
                Ok(Generation {
                    generation: row.get(0)?,
                    built_at: row.get(1)?,
                    record_count: row.get::<_, i64>(2)? as usize,
                    canonical_count: row.get::<_, i64>(3)? as usize,
                    orphan_count: row.get::<_, i64>(4)? as usize,
                    checksum: row.get(5)?,
                })
            })
            .optional()?;
        Ok(generation)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn discard_staging(&self) -> Result<()> {
        let staging = self.tables.staging();
        if self.table_exists(&staging)? {
            warn!(table = %staging, "discarding staging table");
            self.conn
                .execute_batch(&format!("DROP TABLE {}", quote(&staging)))?;
        }
        Ok(())
    }

    /// Bulk-load `records` into the staging table and verify what landed.
    fn stage(&self, records: &[IntervalRecord]) -> Result<()> {
        let staging = self.tables.staging();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(&format!(
            "CREATE TABLE {} (
                lft INTEGER NOT NULL PRIMARY KEY,
                rght INTEGER NOT NULL,
                doid TEXT,
                name TEXT NOT NULL,
                def TEXT
            )",
            quote(&staging)
        ))?;

        let per_statement = self.rows_per_statement();
        for (batch_no, batch) in records.chunks(per_statement).enumerate() {
            let sql = insert_sql(&staging, batch.len());
            let mut stmt = tx.prepare_cached(&sql)?;

            let mut values: Vec<&dyn ToSql> = Vec::with_capacity(batch.len() * COLUMNS_PER_ROW);
            for record in batch {
                values.push(&record.left);
                values.push(&record.right);
                values.push(&record.external_id);
                values.push(&record.name);
                values.push(&record.definition);
            }
            stmt.execute(&*values)?;
            debug!(batch = batch_no, rows = batch.len(), "staged batch");
        }

        let (rows, distinct): (i64, i64) = tx.query_row(
            &format!("SELECT COUNT(*), COUNT(DISTINCT lft) FROM {}", quote(&staging)),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if rows as usize != records.len() || distinct != rows {
            return Err(IndexError::constraint_violation(format!(
                "staged {} rows with {} distinct lft values, expected {}",
                rows,
                distinct,
                records.len()
            )));
        }

        tx.commit()?;
        Ok(())
    }

    /// Swap staging into the published name and record the generation.
    ///
    /// The rename runs with `legacy_alter_table` on: otherwise SQLite
    /// re-parses every view over the index at rename time, and the table
    /// those views read was dropped a statement earlier.
    fn promote(&self, records: &[IntervalRecord]) -> Result<Generation> {
        let legacy: bool = self
            .conn
            .pragma_query_value(None, "legacy_alter_table", |row| row.get(0))?;
        self.conn.pragma_update(None, "legacy_alter_table", true)?;

        let promoted = self.swap_in(records);

        if let Err(err) = self.conn.pragma_update(None, "legacy_alter_table", legacy) {
            warn!(error = %err, "failed to restore legacy_alter_table");
        }
        promoted
    }

    fn swap_in(&self, records: &[IntervalRecord]) -> Result<Generation> {
        let index = &self.tables.index;
        let meta = self.tables.meta();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {index};
             ALTER TABLE {staging} RENAME TO {index};
             CREATE INDEX {lookup} ON {index} (doid);
             CREATE TABLE IF NOT EXISTS {meta} (
                generation INTEGER PRIMARY KEY,
                built_at TEXT NOT NULL,
                record_count INTEGER NOT NULL,
                canonical_count INTEGER NOT NULL,
                orphan_count INTEGER NOT NULL,
                checksum TEXT NOT NULL
             );",
            index = quote(index),
            staging = quote(&self.tables.staging()),
            lookup = quote(&format!("{}_doid_idx", index)),
            meta = quote(&meta),
        ))?;

        let previous: Option<i64> = tx.query_row(
            &format!("SELECT MAX(generation) FROM {}", quote(&meta)),
            [],
            |row| row.get(0),
        )?;

        let orphan_count = records.iter().filter(|r| r.is_orphan()).count();
        let generation = Generation {
            generation: previous.unwrap_or(0) + 1,
            built_at: Utc::now().to_rfc3339(),
            record_count: records.len(),
            canonical_count: records.len() - orphan_count,
            orphan_count,
            checksum: interval_checksum(records),
        };

        tx.execute(
            &format!(
                "INSERT INTO {} (
                    generation, built_at, record_count, canonical_count, orphan_count, checksum
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                quote(&meta)
            ),
            params![
                generation.generation,
                &generation.built_at,
                generation.record_count as i64,
                generation.canonical_count as i64,
                generation.orphan_count as i64,
                &generation.checksum,
            ],
        )?;

        tx.commit()?;
        Ok(generation)
    }

    fn query_records(&self, sql: &str, param: &dyn ToSql) -> Result<Vec<IntervalRecord>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let records = stmt
            .query_map([param], read_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl IndexStore for SqliteIndexStore<'_> {
    fn replace(&mut self, records: &[IntervalRecord]) -> Result<Generation> {
        validate_records(records)?;
        self.discard_staging()?;

        if let Err(err) = self.stage(records) {
            if let Err(cleanup) = self.discard_staging() {
                warn!(error = %cleanup, "failed to drop staging table after error");
            }
            return Err(err);
        }

        let generation = match self.promote(records) {
            Ok(generation) => generation,
            Err(err) => {
                if let Err(cleanup) = self.discard_staging() {
                    warn!(error = %cleanup, "failed to drop staging table after error");
                }
                return Err(err);
            }
        };

        info!(
            table = %self.tables.index,
            generation = generation.generation,
            records = generation.record_count,
            checksum = %generation.checksum,
            "index generation published"
        );
        Ok(generation)
    }
}

impl IndexQuery for SqliteIndexStore<'_> {
    fn lookup(&self, external_id: &str) -> Result<Vec<IntervalRecord>> {
        let sql = format!(
            "SELECT lft, rght, doid, name, def FROM {} WHERE doid = ?1 ORDER BY lft",
            quote(&self.tables.index)
        );
        self.query_records(&sql, &external_id)
    }

    fn descendants_of_name(&self, name: &str) -> Result<Vec<IntervalRecord>> {
        let index = quote(&self.tables.index);
        let sql = format!(
            "SELECT lst.lft, lst.rght, lst.doid, lst.name, lst.def
             FROM {index} lst,
                  (SELECT lft, rght FROM {index} WHERE name = ?1 ORDER BY lft LIMIT 1) finder
             WHERE finder.lft <= lst.lft AND finder.rght >= lst.rght
             ORDER BY lst.lft"
        );
        self.query_records(&sql, &name)
    }

    fn ancestors_of(&self, left: i64) -> Result<Vec<IntervalRecord>> {
        let index = quote(&self.tables.index);
        let sql = format!(
            "SELECT anc.lft, anc.rght, anc.doid, anc.name, anc.def
             FROM {index} anc, (SELECT lft, rght FROM {index} WHERE lft = ?1) target
             WHERE anc.lft <= target.lft AND anc.rght >= target.rght
             ORDER BY anc.lft"
        );
        self.query_records(&sql, &left)
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<IntervalRecord> {
    Ok(IntervalRecord {
        left: row.get(0)?,
        right: row.get(1)?,
        external_id: row.get(2)?,
        name: row.get(3)?,
        definition: row.get(4)?,
    })
}

fn insert_sql(table: &str, rows: usize) -> String {
    let tuple = "(?, ?, ?, ?, ?)";
    let values = vec![tuple; rows].join(", ");
    format!(
        "INSERT INTO {} (lft, rght, doid, name, def) VALUES {}",
        quote(table),
        values
    )
}

/// Reject record sets that would break the primary key or the interval shape
/// before anything touches the store.
fn validate_records(records: &[IntervalRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.left < 1 || record.right < record.left {
            return Err(IndexError::constraint_violation(format!(
                "invalid interval [{}, {}] for '{}'",
                record.left, record.right, record.name
            )));
        }
        if !seen.insert(record.left) {
            return Err(IndexError::constraint_violation(format!(
                "duplicate lft {}",
                record.left
            )));
        }
    }
    Ok(())
}
