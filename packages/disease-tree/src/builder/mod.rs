//! Interval assignment: canonical traversal, then orphan augmentation

pub mod orphan;
pub mod tree;

pub use orphan::OrphanAugmenter;
pub use tree::{BuildOutput, TraversalContext, TreeBuilder};
