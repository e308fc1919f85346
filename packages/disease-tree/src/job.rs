//! Rebuild job: traverse, augment, publish
//!
//! One run either publishes a complete new generation or fails and leaves the
//! previous one in place; there is no retry and no partial commit.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::builder::{OrphanAugmenter, TreeBuilder};
use crate::config::JobConfig;
use crate::domain::{
    interval_checksum, Generation, HierarchySource, IndexStore, IntervalRecord, LabelSource,
};
use crate::error::Result;

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub root_id: String,
    pub canonical_records: usize,
    pub orphan_records: usize,
    /// Last counter value consumed by the canonical traversal
    pub last_canonical: i64,
    pub checksum: String,
    /// `None` for a dry run
    pub generation: Option<Generation>,
    pub duration_ms: u64,
}

impl RebuildReport {
    pub fn total_records(&self) -> usize {
        self.canonical_records + self.orphan_records
    }
}

/// Full record set of one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledIndex {
    /// Canonical records in postorder, then orphans in label order
    pub records: Vec<IntervalRecord>,
    pub canonical_records: usize,
    pub last_canonical: i64,
}

pub struct RebuildJob {
    config: JobConfig,
}

impl RebuildJob {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Build the canonical tree and append the orphan labels.
    pub fn assemble<H, L>(&self, hierarchy: &H, labels: &L) -> Result<AssembledIndex>
    where
        H: HierarchySource + ?Sized,
        L: LabelSource + ?Sized,
    {
        let tree = TreeBuilder::new(hierarchy)
            .with_progress_every(self.config.progress_every)
            .build(&self.config.root_id)?;

        let unlinked = labels.unlinked_labels()?;
        let orphans = OrphanAugmenter::new(self.config.orphan_definition.as_str())
            .with_progress_every(self.config.progress_every)
            .augment(unlinked, tree.last);

        let canonical_records = tree.records.len();
        let mut records = tree.records;
        records.extend(orphans);

        Ok(AssembledIndex {
            records,
            canonical_records,
            last_canonical: tree.last,
        })
    }

    /// Assemble and publish a new generation through `store`.
    pub fn run<H, L, S>(&self, hierarchy: &H, labels: &L, store: &mut S) -> Result<RebuildReport>
    where
        H: HierarchySource + ?Sized,
        L: LabelSource + ?Sized,
        S: IndexStore + ?Sized,
    {
        let _span = info_span!("rebuild", root = %self.config.root_id).entered();
        let started = Instant::now();

        let assembled = self.assemble(hierarchy, labels)?;
        let generation = store.replace(&assembled.records)?;

        let report = self.report(&assembled, Some(generation), started);
        info!(
            records = report.total_records(),
            orphans = report.orphan_records,
            duration_ms = report.duration_ms,
            "rebuild complete"
        );
        Ok(report)
    }

    /// Assemble without touching any store.
    pub fn dry_run<H, L>(&self, hierarchy: &H, labels: &L) -> Result<RebuildReport>
    where
        H: HierarchySource + ?Sized,
        L: LabelSource + ?Sized,
    {
        let _span = info_span!("dry_run", root = %self.config.root_id).entered();
        let started = Instant::now();

        let assembled = self.assemble(hierarchy, labels)?;
        Ok(self.report(&assembled, None, started))
    }

    fn report(
        &self,
        assembled: &AssembledIndex,
        generation: Option<Generation>,
        started: Instant,
    ) -> RebuildReport {
        RebuildReport {
            root_id: self.config.root_id.clone(),
            canonical_records: assembled.canonical_records,
            orphan_records: assembled.records.len() - assembled.canonical_records,
            last_canonical: assembled.last_canonical,
            checksum: interval_checksum(&assembled.records),
            generation,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}
