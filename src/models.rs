//! Data models for the trait graph.
//!
//! This module contains the input row types (one per study or study pair)
//! and the derived structures the aggregators and the service hand back:
//! trait nodes, aggregated edges, ranked neighbors and resolution results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One heritability measurement (one study of one trait).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeritabilityRow {
    /// Unique study identifier.
    pub study_id: Option<i64>,
    /// Canonical trait identifier; the grouping key.
    pub trait_id: Option<String>,
    /// Free-text display label of the trait.
    #[serde(default)]
    pub trait_label: Option<String>,
    /// Heritability point estimate.
    pub h2_estimate: Option<f64>,
    /// Standard error of the heritability estimate.
    pub h2_standard_error: Option<f64>,
    /// Reported Z-score (informational only).
    #[serde(default)]
    pub h2_z: Option<f64>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub chapter_level: Option<String>,
    #[serde(default)]
    pub pmid: Option<String>,
    #[serde(default)]
    pub sample_size: Option<u64>,
    #[serde(default)]
    pub population: Option<String>,
    #[serde(default)]
    pub consortium: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl HeritabilityRow {
    /// Creates a row with the fields the aggregators actually pool over.
    pub fn new(study_id: i64, trait_id: &str, h2_estimate: f64, h2_standard_error: f64) -> Self {
        Self {
            study_id: Some(study_id),
            trait_id: Some(trait_id.to_string()),
            h2_estimate: Some(h2_estimate),
            h2_standard_error: Some(h2_standard_error),
            ..Self::default()
        }
    }

    /// Clears blank strings and non-finite numbers so later stages only
    /// ever see `None` for "absent".
    pub fn sanitized(mut self) -> Self {
        self.trait_id = clean_text(self.trait_id);
        self.trait_label = clean_text(self.trait_label);
        self.domain = clean_text(self.domain);
        self.chapter_level = clean_text(self.chapter_level);
        self.pmid = clean_text(self.pmid);
        self.population = clean_text(self.population);
        self.consortium = clean_text(self.consortium);
        self.h2_estimate = self.h2_estimate.filter(|v| v.is_finite());
        self.h2_standard_error = self.h2_standard_error.filter(|v| v.is_finite());
        self.h2_z = self.h2_z.filter(|v| v.is_finite());
        self
    }
}

/// One genetic correlation measurement between two studies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRow {
    pub study_id_1: Option<i64>,
    pub study_id_2: Option<i64>,
    /// Genetic correlation point estimate.
    pub rg_estimate: Option<f64>,
    /// Standard error of the correlation estimate.
    pub rg_standard_error: Option<f64>,
    /// Reported Z-score (informational only).
    #[serde(default)]
    pub rg_z: Option<f64>,
    /// Reported p-value (informational only).
    #[serde(default)]
    pub rg_p: Option<f64>,
}

impl CorrelationRow {
    pub fn new(study_id_1: i64, study_id_2: i64, rg_estimate: f64, rg_standard_error: f64) -> Self {
        Self {
            study_id_1: Some(study_id_1),
            study_id_2: Some(study_id_2),
            rg_estimate: Some(rg_estimate),
            rg_standard_error: Some(rg_standard_error),
            rg_z: None,
            rg_p: None,
        }
    }

    pub fn sanitized(mut self) -> Self {
        self.rg_estimate = self.rg_estimate.filter(|v| v.is_finite());
        self.rg_standard_error = self.rg_standard_error.filter(|v| v.is_finite());
        self.rg_z = self.rg_z.filter(|v| v.is_finite());
        self.rg_p = self.rg_p.filter(|v| v.is_finite());
        self
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Per-study provenance carried on a [`TraitNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub study_id: Option<i64>,
    pub h2_estimate: Option<f64>,
    pub h2_standard_error: Option<f64>,
    pub h2_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consortium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl From<&HeritabilityRow> for StudyRecord {
    fn from(row: &HeritabilityRow) -> Self {
        Self {
            study_id: row.study_id,
            h2_estimate: row.h2_estimate,
            h2_standard_error: row.h2_standard_error,
            h2_z: row.h2_z,
            pmid: row.pmid.clone(),
            sample_size: row.sample_size,
            population: row.population.clone(),
            consortium: row.consortium.clone(),
            year: row.year,
        }
    }
}

/// A trait with its heritability meta-analyzed across every study that
/// measured it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitNode {
    pub trait_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_level: Option<String>,
    /// Pooled heritability; `None` when no study had a usable estimate.
    pub h2_meta: Option<f64>,
    pub h2_se_meta: Option<f64>,
    pub h2_z_meta: Option<f64>,
    pub h2_p_meta: Option<f64>,
    /// Number of studies that entered the pooled estimate.
    pub n_valid: usize,
    /// Number of studies attached to the trait, valid or not.
    pub study_count: usize,
    pub provenance: Vec<StudyRecord>,
}

/// Raw statistics of one study pair contributing to an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeProvenance {
    pub study_id_1: i64,
    pub study_id_2: i64,
    pub rg: Option<f64>,
    pub se: Option<f64>,
    pub z: Option<f64>,
    pub p: Option<f64>,
}

/// Genetic correlation between two traits, pooled over every study pair.
///
/// `trait_a` is always lexicographically smaller than `trait_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEdge {
    pub trait_a: String,
    pub trait_b: String,
    pub rg_meta: f64,
    pub rg_se_meta: f64,
    pub rg_z_meta: f64,
    pub rg_p_meta: f64,
    /// Study pairs that entered the pooled estimate.
    pub n_valid: usize,
    /// Every contributing study pair, including ones excluded from pooling.
    pub correlation_count: usize,
    pub provenance: Vec<EdgeProvenance>,
}

/// A neighbor trait ranked by transfer score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedNeighbor {
    pub trait_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub rg_meta: f64,
    pub rg_z_meta: f64,
    pub h2_meta: f64,
    pub h2_z_meta: f64,
    /// `rg_meta² × h2_meta`.
    pub score: f64,
    pub correlation_count: usize,
}

/// How a query string was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMethod {
    /// Nothing matched.
    None,
    /// Exact match on a normalized trait id or display label.
    Alias,
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMethod::None => write!(f, "none"),
            ResolutionMethod::Alias => write!(f, "alias"),
        }
    }
}

/// Confidence attached to a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "Low"),
            Confidence::High => write!(f, "High"),
        }
    }
}

/// A canonical trait a query could refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitCandidate {
    pub trait_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_level: Option<String>,
    pub study_count: usize,
}

/// Outcome of resolving a free-form query to a canonical trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub query: String,
    pub normalized_query: String,
    pub resolved_trait_id: Option<String>,
    pub method: ResolutionMethod,
    pub confidence: Confidence,
    pub candidates: Vec<TraitCandidate>,
    pub rationale: String,
}

impl ResolutionResult {
    /// Whether more than one canonical trait shared the matched alias.
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// One study pair behind an edge, joined with both studies' records and
/// oriented so the study on the source trait comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPairEvidence {
    pub source_study_id: i64,
    pub target_study_id: i64,
    pub rg: Option<f64>,
    pub se: Option<f64>,
    pub z: Option<f64>,
    pub p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_study: Option<StudyRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_study: Option<StudyRecord>,
}

/// Edge provenance reshaped for audit and justification text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPowerResult {
    pub source_trait: String,
    pub target_trait: String,
    pub rg_meta: f64,
    pub rg_se_meta: f64,
    pub rg_z_meta: f64,
    pub rg_p_meta: f64,
    pub correlation_count: usize,
    pub n_valid: usize,
    pub study_pairs: Vec<StudyPairEvidence>,
    /// Sum of sample sizes over the distinct studies joined in.
    pub total_sample_size: u64,
    /// Smallest sample size among the distinct studies joined in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_sample_size: Option<u64>,
    pub populations: Vec<String>,
    pub pmids: Vec<String>,
}
