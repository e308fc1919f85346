//! Synthetic records for labels outside the canonical hierarchy

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::domain::IntervalRecord;

/// Appends singleton records for unlinked labels after the canonical range.
#[derive(Debug, Clone)]
pub struct OrphanAugmenter {
    definition: String,
    progress_every: u64,
}

impl OrphanAugmenter {
    /// `definition` is stored on every synthetic record.
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            progress_every: 1_000,
        }
    }

    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// One record per distinct label, numbered `after + 1, after + 2, ...` in
    /// lexicographic label order.
    pub fn augment<I, L>(&self, labels: I, after: i64) -> Vec<IntervalRecord>
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        // source order is not stable between runs
        let sorted: BTreeSet<String> = labels.into_iter().map(Into::into).collect();

        let mut records = Vec::with_capacity(sorted.len());
        for (label, position) in sorted.into_iter().zip((after + 1)..) {
            if position as u64 % self.progress_every == 0 {
                debug!(counter = position, appended = records.len(), "orphan progress");
            }
            records.push(IntervalRecord::orphan(position, label, self.definition.as_str()));
        }

        info!(orphans = records.len(), first = after + 1, "orphan labels appended");
        records
    }
}
