//! TraitGraph - genetic trait correlation graph
//!
//! Builds a knowledge graph from GWAS heritability and genetic correlation
//! summary tables. Traits are nodes carrying meta-analyzed heritability,
//! trait pairs are edges carrying meta-analyzed genetic correlation, and
//! queries rank the neighbors of a trait for transfer learning.

pub mod analysis;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod report;
pub mod resolver;
pub mod service;
pub mod synonyms;

pub use analysis::{meta_analyze, EdgeAggregator, MetaResult, TraitAggregator};
pub use error::{GraphError, Result};
pub use models::*;
pub use resolver::normalize_query;
pub use service::{BuildSettings, ExpandedNeighbors, GraphStats, KnowledgeGraphService};
pub use synonyms::{NoSynonyms, StaticSynonyms, SynonymProvider};
