//! Query report rendering.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report};

use crate::models::{PrioritizedNeighbor, ResolutionResult, StudyPowerResult, TraitNode};
use crate::service::GraphStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about the query report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Heritability table the graph was built from.
    pub heritability_source: String,
    /// Correlation table the graph was built from.
    pub correlation_source: String,
    pub rg_z_threshold: f64,
    pub h2_z_threshold: f64,
    /// Size of the graph.
    pub stats: GraphStats,
}

/// Everything answered for one trait query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReport {
    pub metadata: ReportMetadata,
    /// Resolution of the query as typed.
    pub resolution: ResolutionResult,
    /// Resolutions of alternative query strings that were tried.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<ResolutionResult>,
    /// Pooled heritability of the resolved trait.
    pub trait_node: Option<TraitNode>,
    /// Ranked neighbors, best first.
    pub neighbors: Vec<PrioritizedNeighbor>,
    /// Edge provenance for the selected neighbors or the requested target.
    pub provenance: Vec<StudyPowerResult>,
}

impl QueryReport {
    /// Creates an empty report for a resolution.
    pub fn new(metadata: ReportMetadata, resolution: ResolutionResult) -> Self {
        Self {
            metadata,
            resolution,
            alternatives: Vec::new(),
            trait_node: None,
            neighbors: Vec::new(),
            provenance: Vec::new(),
        }
    }

    /// Trait the report is about, if the query resolved.
    pub fn trait_id(&self) -> Option<&str> {
        self.resolution.resolved_trait_id.as_deref()
    }
}
