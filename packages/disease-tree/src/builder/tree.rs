//! Depth-first nested-set numbering of the canonical hierarchy
//!
//! Preorder numbering, postorder emission: a node takes `left` from the
//! counter when it is entered, its children consume further values, and its
//! record is emitted with `right` = the counter's value once the last child
//! has been closed. Every descendant's interval therefore falls strictly
//! inside its ancestor's.
//!
//! The traversal keeps an explicit stack of frames instead of recursing, so
//! hierarchy depth is bounded by heap memory rather than the thread stack.
//! Shared descendants (a node under two parents) are visited once per path
//! and get one record per visit.

use std::collections::HashSet;
use std::vec;

use tracing::{debug, info};

use crate::domain::{HierarchySource, IntervalRecord};
use crate::error::{IndexError, Result};

/// Counter plus append-only output for one traversal.
#[derive(Debug, Default)]
pub struct TraversalContext {
    counter: i64,
    records: Vec<IntervalRecord>,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment, then return the new value. The first call yields 1.
    pub fn advance(&mut self) -> i64 {
        self.counter += 1;
        self.counter
    }

    /// Last value handed out (0 before the first `advance`).
    pub fn current(&self) -> i64 {
        self.counter
    }

    pub fn emit(&mut self, record: IntervalRecord) {
        self.records.push(record);
    }

    pub fn finish(self) -> BuildOutput {
        BuildOutput {
            last: self.counter,
            records: self.records,
        }
    }
}

/// Result of a traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Records in emission (postorder) order
    pub records: Vec<IntervalRecord>,
    /// Last counter value consumed; orphan numbering continues after it
    pub last: i64,
}

struct Frame {
    id: String,
    remaining: vec::IntoIter<String>,
    left: i64,
}

/// Builds the interval records of the canonical hierarchy.
pub struct TreeBuilder<'a, S: HierarchySource + ?Sized> {
    source: &'a S,
    progress_every: u64,
}

impl<'a, S: HierarchySource + ?Sized> TreeBuilder<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            progress_every: 1_000,
        }
    }

    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Traverse from `root_id` and return every record of the subtree.
    ///
    /// # Errors
    ///
    /// - `NotFound` if any visited node lacks metadata
    /// - `CycleDetected` if a node lists one of its own ancestors as a child
    /// - `StoreUnavailable` if the source cannot be read
    ///
    /// No partial output is returned on error.
    pub fn build(&self, root_id: &str) -> Result<BuildOutput> {
        let mut ctx = TraversalContext::new();
        let mut stack: Vec<Frame> = Vec::new();
        // ids on the current root-to-top path; mirrors `stack`
        let mut on_path: HashSet<String> = HashSet::new();

        self.enter(root_id.to_string(), &mut ctx, &mut stack, &mut on_path)?;

        loop {
            let next_child = match stack.last_mut() {
                Some(frame) => frame.remaining.next(),
                None => break,
            };

            match next_child {
                Some(child) => {
                    if on_path.contains(&child) {
                        let mut path: Vec<String> = stack.iter().map(|f| f.id.clone()).collect();
                        path.push(child);
                        return Err(IndexError::cycle_detected(&path));
                    }
                    self.enter(child, &mut ctx, &mut stack, &mut on_path)?;
                }
                None => {
                    let Some(frame) = stack.pop() else { break };
                    on_path.remove(&frame.id);

                    let right = ctx.current();
                    let (name, definition) = self.source.node_details(&frame.id)?;
                    ctx.emit(IntervalRecord::canonical(
                        frame.left, right, frame.id, name, definition,
                    ));
                }
            }
        }

        let output = ctx.finish();
        info!(
            root = root_id,
            records = output.records.len(),
            last = output.last,
            "hierarchy traversal complete"
        );
        Ok(output)
    }

    fn enter(
        &self,
        id: String,
        ctx: &mut TraversalContext,
        stack: &mut Vec<Frame>,
        on_path: &mut HashSet<String>,
    ) -> Result<()> {
        let left = ctx.advance();
        if left as u64 % self.progress_every == 0 {
            debug!(counter = left, depth = stack.len(), "traversal progress");
        }

        let children = self.source.children(&id)?;
        on_path.insert(id.clone());
        stack.push(Frame {
            id,
            remaining: children.into_iter(),
            left,
        });
        Ok(())
    }
}
