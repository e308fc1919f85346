//! End-to-end rebuild against a SQLite warehouse
//!
//! Covers the staged swap: successful publication, failure before and during
//! staging, cycles, shared descendants and repeat runs.

use std::path::Path;

use disease_tree::{
    open_database, ErrorKind, IndexQuery, JobConfig, RebuildJob, SqliteIndexStore, SqliteSource,
};
use rusqlite::Connection;
use tempfile::TempDir;

const SCHEMA: &str = r#"
CREATE TABLE "do" (doid TEXT PRIMARY KEY, name TEXT NOT NULL, def TEXT);
CREATE TABLE do_parent (doid TEXT NOT NULL, parent_id TEXT NOT NULL);
CREATE TABLE disease (id INTEGER PRIMARY KEY, ncats_name TEXT, did TEXT);
"#;

/// R -> (A -> A1), B
const WORKED_EXAMPLE: &str = r#"
INSERT INTO "do" VALUES ('R', 'disease', 'root concept');
INSERT INTO "do" VALUES ('A', 'disease of anatomical entity', NULL);
INSERT INTO "do" VALUES ('A1', 'nervous system disease', NULL);
INSERT INTO "do" VALUES ('B', 'syndrome', NULL);
INSERT INTO do_parent VALUES ('A', 'R');
INSERT INTO do_parent VALUES ('B', 'R');
INSERT INTO do_parent VALUES ('A1', 'A');

INSERT INTO disease (ncats_name, did) VALUES ('nervous system disease', 'DOID:863');
INSERT INTO disease (ncats_name, did) VALUES ('Zellweger syndrome', 'MESH:D015211');
INSERT INTO disease (ncats_name, did) VALUES ('Alport syndrome', NULL);
"#;

fn config(dir: &TempDir) -> JobConfig {
    JobConfig {
        database: dir.path().join("warehouse.db"),
        root_id: "R".to_string(),
        batch_size: 2,
        ..JobConfig::default()
    }
}

fn seed(path: &Path, sql: &str) -> Connection {
    let conn = open_database(path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn.execute_batch(sql).unwrap();
    conn
}

fn rebuild(
    conn: &Connection,
    config: &JobConfig,
) -> disease_tree::Result<disease_tree::RebuildReport> {
    let source = SqliteSource::from_config(conn, config);
    let mut store = SqliteIndexStore::from_config(conn, config);
    RebuildJob::new(config.clone()).run(&source, &source, &mut store)
}

fn bounds(conn: &Connection, config: &JobConfig) -> Vec<(i64, i64, Option<String>)> {
    SqliteIndexStore::from_config(conn, config)
        .published_records()
        .unwrap()
        .into_iter()
        .map(|r| (r.left, r.right, r.external_id))
        .collect()
}

#[test]
fn test_worked_example_is_published() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);

    let report = rebuild(&conn, &config).unwrap();
    assert_eq!(report.canonical_records, 4);
    assert_eq!(report.orphan_records, 2);

    assert_eq!(
        bounds(&conn, &config),
        vec![
            (1, 4, Some("R".to_string())),
            (2, 3, Some("A".to_string())),
            (3, 3, Some("A1".to_string())),
            (4, 4, Some("B".to_string())),
            (5, 5, None),
            (6, 6, None),
        ]
    );

    let store = SqliteIndexStore::from_config(&conn, &config);
    let orphans = store.published_records().unwrap().split_off(4);
    assert_eq!(orphans[0].name, "Alport syndrome");
    assert_eq!(orphans[1].name, "Zellweger syndrome");
    assert!(orphans
        .iter()
        .all(|r| r.definition.as_deref() == Some("non-standard DO name")));
}

#[test]
fn test_missing_metadata_leaves_index_byte_for_byte() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);
    rebuild(&conn, &config).unwrap();

    conn.execute("DELETE FROM \"do\" WHERE doid = 'A1'", []).unwrap();
    let before = std::fs::read(&config.database).unwrap();
    let records_before = bounds(&conn, &config);

    let err = rebuild(&conn, &config).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(err.message.contains("A1"));

    assert_eq!(std::fs::read(&config.database).unwrap(), before);
    assert_eq!(bounds(&conn, &config), records_before);
}

#[test]
fn test_cycle_is_rejected_and_index_kept() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);
    rebuild(&conn, &config).unwrap();
    let records_before = bounds(&conn, &config);

    conn.execute("INSERT INTO do_parent VALUES ('R', 'A1')", []).unwrap();
    let err = rebuild(&conn, &config).unwrap_err();

    assert_eq!(err.kind, ErrorKind::CycleDetected);
    assert_eq!(bounds(&conn, &config), records_before);
}

#[test]
fn test_staging_failure_keeps_prior_generation() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);
    let first = rebuild(&conn, &config).unwrap();
    let records_before = bounds(&conn, &config);

    // a view squatting on the staging name makes CREATE TABLE fail
    conn.execute_batch("CREATE VIEW ncats_do_staging AS SELECT 1 AS x")
        .unwrap();
    let err = rebuild(&conn, &config).unwrap_err();
    assert_eq!(err.kind, ErrorKind::StoreUnavailable);

    let store = SqliteIndexStore::from_config(&conn, &config);
    assert_eq!(bounds(&conn, &config), records_before);
    assert_eq!(
        store.latest_generation().unwrap().unwrap().generation,
        first.generation.unwrap().generation
    );
}

#[test]
fn test_promotion_failure_keeps_prior_generation() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);
    let first = rebuild(&conn, &config).unwrap();
    let records_before = bounds(&conn, &config);

    // a table holding the lookup index's name makes CREATE INDEX fail after the swap
    conn.execute_batch(
        "DROP INDEX ncats_do_doid_idx;
         CREATE TABLE ncats_do_doid_idx (x INTEGER);",
    )
    .unwrap();
    conn.execute("INSERT INTO do_parent VALUES ('A1', 'B')", []).unwrap();
    let err = rebuild(&conn, &config).unwrap_err();
    assert_eq!(err.kind, ErrorKind::StoreUnavailable);

    let store = SqliteIndexStore::from_config(&conn, &config);
    assert_eq!(bounds(&conn, &config), records_before);
    assert_eq!(
        store.latest_generation().unwrap().unwrap(),
        first.generation.unwrap()
    );

    let staging_left: bool = conn
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE name = 'ncats_do_staging')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(!staging_left);
}

#[test]
fn test_view_over_index_does_not_block_rebuilds() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);
    rebuild(&conn, &config).unwrap();

    conn.execute_batch("CREATE VIEW do_leaves AS SELECT doid FROM ncats_do WHERE lft = rght")
        .unwrap();
    conn.execute("INSERT INTO do_parent VALUES ('A1', 'B')", []).unwrap();
    let report = rebuild(&conn, &config).unwrap();
    assert_eq!(report.generation.unwrap().generation, 2);

    let leaves: i64 = conn
        .query_row("SELECT COUNT(*) FROM do_leaves", [], |row| row.get(0))
        .unwrap();
    // A1 under both parents plus the two orphans
    assert_eq!(leaves, 4);
}

#[test]
fn test_repeat_runs_are_deterministic() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);

    let first = rebuild(&conn, &config).unwrap();
    let second = rebuild(&conn, &config).unwrap();

    assert_eq!(first.checksum, second.checksum);
    let (g1, g2) = (first.generation.unwrap(), second.generation.unwrap());
    assert_eq!(g2.generation, g1.generation + 1);
    assert_eq!(g1.checksum, g2.checksum);
}

#[test]
fn test_shared_descendant_gets_one_row_per_path() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);
    conn.execute("INSERT INTO do_parent VALUES ('A1', 'B')", []).unwrap();

    rebuild(&conn, &config).unwrap();
    let store = SqliteIndexStore::from_config(&conn, &config);

    let copies: Vec<(i64, i64)> = store
        .lookup("A1")
        .unwrap()
        .into_iter()
        .map(|r| (r.left, r.right))
        .collect();
    assert_eq!(copies, vec![(3, 3), (5, 5)]);

    // both copies resolve to their own ancestor chain
    let via_b: Vec<String> = store
        .ancestors_of(5)
        .unwrap()
        .into_iter()
        .filter_map(|r| r.external_id)
        .collect();
    assert_eq!(via_b, vec!["R", "B", "A1"]);
}

#[test]
fn test_descendant_query_over_published_index() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let conn = seed(&config.database, WORKED_EXAMPLE);
    rebuild(&conn, &config).unwrap();

    let store = SqliteIndexStore::from_config(&conn, &config);
    let names: Vec<String> = store
        .descendants_of_name("disease of anatomical entity")
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(
        names,
        vec!["disease of anatomical entity", "nervous system disease"]
    );
}

#[test]
fn test_reader_connection_sees_complete_index() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let writer = seed(&config.database, WORKED_EXAMPLE);
    rebuild(&writer, &config).unwrap();

    writer
        .execute_batch(
            "INSERT INTO \"do\" VALUES ('C', 'cancer', NULL);
             INSERT INTO do_parent VALUES ('C', 'R');",
        )
        .unwrap();
    rebuild(&writer, &config).unwrap();

    let reader = Connection::open(&config.database).unwrap();
    let count: i64 = reader
        .query_row("SELECT COUNT(*) FROM ncats_do", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 7);

    let root_right: i64 = reader
        .query_row("SELECT rght FROM ncats_do WHERE lft = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(root_right, 5);
}
