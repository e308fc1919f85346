//! Disease hierarchy nested-set index builder
//!
//! Flattens the disease-concept hierarchy into a table of `[left, right]`
//! intervals so that ancestor/descendant questions become interval
//! containment checks, with no recursive traversal at query time.
//!
//! ## Pipeline
//!
//! 1. `TreeBuilder`: iterative depth-first traversal from the root, preorder
//!    numbering, postorder emission
//! 2. `OrphanAugmenter`: one singleton record per disease label that has no
//!    canonical identifier, numbered after the tree
//! 3. `IndexStore::replace`: stage, validate, atomically promote
//!
//! ## Usage
//!
//! ```rust,ignore
//! use disease_tree::{JobConfig, RebuildJob, SqliteIndexStore, SqliteSource};
//!
//! let config = JobConfig::from_yaml("disease-tree.yaml")?;
//! let conn = disease_tree::open_database(&config.database)?;
//! let source = SqliteSource::from_config(&conn, &config);
//! let mut store = SqliteIndexStore::from_config(&conn, &config);
//!
//! let report = RebuildJob::new(config).run(&source, &source, &mut store)?;
//! println!("published {} records", report.total_records());
//! ```

pub mod builder;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod job;

pub use error::{ErrorKind, IndexError, Result};

pub use builder::{BuildOutput, OrphanAugmenter, TreeBuilder};
pub use config::{ConfigError, JobConfig, TableNames};
pub use domain::{
    interval_checksum, Generation, HierarchyNode, HierarchySource, IndexQuery, IndexStore,
    IntervalRecord, LabelSource,
};
pub use infrastructure::MemoryHierarchy;
pub use job::{AssembledIndex, RebuildJob, RebuildReport};

#[cfg(feature = "sqlite")]
pub use infrastructure::{open_database, SqliteIndexStore, SqliteSource};
