//! Statistical aggregation modules.
//!
//! Meta-analysis plus the two table indexes built on it: heritability by
//! trait and genetic correlation by trait pair.

pub mod edges;
pub mod meta;
pub mod traits;

pub use edges::{EdgeAggregator, EdgeBuildStats, TraitPair};
pub use meta::{meta_analyze, two_sided_p, MetaResult};
pub use traits::TraitAggregator;
