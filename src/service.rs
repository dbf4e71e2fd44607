//! Knowledge graph service.
//!
//! Owns the two input tables and builds the trait and edge indexes on first
//! use. Once built, everything is read-only and shared across callers; the
//! only mutable state is the resolution cache.

use crate::analysis::{EdgeAggregator, TraitAggregator};
use crate::models::{
    AggregatedEdge, CorrelationRow, HeritabilityRow, PrioritizedNeighbor, ResolutionResult,
    StudyPairEvidence, StudyPowerResult, TraitNode,
};
use crate::resolver::{normalize_query, AliasIndex};
use crate::synonyms::SynonymProvider;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Settings for the one-time index build.
#[derive(Debug, Clone, Copy)]
pub struct BuildSettings {
    /// Builds slower than this are logged as a warning.
    pub warn_after: Duration,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            warn_after: Duration::from_secs(30),
        }
    }
}

/// Size of the built graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub heritability_rows: usize,
    pub correlation_rows: usize,
    pub traits: usize,
    pub studies: usize,
    pub trait_pairs: usize,
    pub correlations_indexed: usize,
    pub correlations_unmapped: usize,
    pub correlations_self_loop: usize,
    pub build_duration_ms: u128,
}

/// Neighbors merged over a query and its alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedNeighbors {
    /// The original query first, then each alternative tried.
    pub resolutions: Vec<ResolutionResult>,
    pub neighbors: Vec<PrioritizedNeighbor>,
    /// Neighbor trait id → the resolved trait its kept score came from.
    pub sources: BTreeMap<String, String>,
}

impl ExpandedNeighbors {
    /// Distinct trait ids the query and its alternatives resolved to.
    pub fn resolved_trait_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.resolutions
            .iter()
            .filter_map(|r| r.resolved_trait_id.as_deref())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Resolved trait that `neighbor_id` was ranked against.
    pub fn source_of(&self, neighbor_id: &str) -> Option<&str> {
        self.sources.get(neighbor_id).map(String::as_str)
    }
}

struct GraphIndex {
    traits: TraitAggregator,
    edges: EdgeAggregator,
    build_duration: Duration,
}

impl GraphIndex {
    fn build(
        heritability: Arc<[HeritabilityRow]>,
        correlations: Arc<[CorrelationRow]>,
        settings: BuildSettings,
    ) -> Self {
        let start = Instant::now();
        info!(
            "Building trait graph from {} heritability rows and {} correlation rows",
            heritability.len(),
            correlations.len()
        );

        let traits = TraitAggregator::new(heritability);
        let edges = EdgeAggregator::new(correlations, traits.study_trait_map());
        let build_duration = start.elapsed();

        let stats = edges.build_stats();
        info!(
            "Trait graph ready: {} traits, {} trait pairs ({} rows indexed, {} unmapped, {} self-loops) in {:.2}s",
            traits.trait_count(),
            edges.pair_count(),
            stats.indexed,
            stats.unmapped,
            stats.self_loops,
            build_duration.as_secs_f64()
        );
        if build_duration > settings.warn_after {
            warn!(
                "Trait graph build took {:.1}s, above the {:.0}s budget",
                build_duration.as_secs_f64(),
                settings.warn_after.as_secs_f64()
            );
        }

        Self {
            traits,
            edges,
            build_duration,
        }
    }
}

/// Query engine over the heritability and correlation tables.
pub struct KnowledgeGraphService {
    heritability: Arc<[HeritabilityRow]>,
    correlations: Arc<[CorrelationRow]>,
    settings: BuildSettings,
    index: OnceLock<GraphIndex>,
    aliases: OnceLock<AliasIndex>,
    resolution_cache: DashMap<String, ResolutionResult>,
}

impl KnowledgeGraphService {
    /// Creates a service; nothing is indexed until the first query.
    pub fn new(
        heritability: impl Into<Arc<[HeritabilityRow]>>,
        correlations: impl Into<Arc<[CorrelationRow]>>,
    ) -> Self {
        Self::with_settings(heritability, correlations, BuildSettings::default())
    }

    pub fn with_settings(
        heritability: impl Into<Arc<[HeritabilityRow]>>,
        correlations: impl Into<Arc<[CorrelationRow]>>,
        settings: BuildSettings,
    ) -> Self {
        Self {
            heritability: heritability.into(),
            correlations: correlations.into(),
            settings,
            index: OnceLock::new(),
            aliases: OnceLock::new(),
            resolution_cache: DashMap::new(),
        }
    }

    fn index(&self) -> &GraphIndex {
        self.index.get_or_init(|| {
            GraphIndex::build(
                Arc::clone(&self.heritability),
                Arc::clone(&self.correlations),
                self.settings,
            )
        })
    }

    fn aliases(&self) -> &AliasIndex {
        self.aliases.get_or_init(|| {
            let index = AliasIndex::build(self.traits());
            debug!("Alias index built with {} aliases", index.len());
            index
        })
    }

    /// Whether the indexes have been built yet.
    pub fn is_built(&self) -> bool {
        self.index.get().is_some()
    }

    /// Forces the index build; later queries reuse it.
    pub fn warm_up(&self) -> GraphStats {
        self.stats()
    }

    pub fn traits(&self) -> &TraitAggregator {
        &self.index().traits
    }

    pub fn edges(&self) -> &EdgeAggregator {
        &self.index().edges
    }

    pub fn get_trait_node(&self, trait_id: &str) -> Option<TraitNode> {
        self.traits().get_trait_node(trait_id)
    }

    pub fn get_aggregated_edge(&self, trait_a: &str, trait_b: &str) -> Option<AggregatedEdge> {
        self.edges().get_aggregated_edge(trait_a, trait_b)
    }

    /// Resolves a free-form query to a canonical trait id by exact alias
    /// match. Results are cached per normalized query.
    pub fn resolve_trait_id(&self, query: &str) -> ResolutionResult {
        let normalized = normalize_query(query);

        if let Some(cached) = self.resolution_cache.get(&normalized) {
            let mut result = cached.value().clone();
            result.query = query.to_string();
            return result;
        }

        let result = self.aliases().resolve(query, self.traits());
        debug!(
            "Resolved '{}' -> {:?} ({}, {})",
            query, result.resolved_trait_id, result.method, result.confidence
        );
        self.resolution_cache.insert(normalized, result.clone());
        result
    }

    /// Neighbors of `trait_id` whose correlation and own heritability are
    /// both significant, ranked by `rg² × h2`.
    ///
    /// Equal scores are ordered by trait id.
    pub fn get_prioritized_neighbors(
        &self,
        trait_id: &str,
        rg_z_threshold: f64,
        h2_z_threshold: f64,
    ) -> Vec<PrioritizedNeighbor> {
        let neighbors = self.edges().get_neighbor_traits(trait_id);
        if neighbors.is_empty() {
            debug!("No neighbors for {}", trait_id);
            return Vec::new();
        }

        let mut ranked: Vec<PrioritizedNeighbor> = neighbors
            .iter()
            .filter_map(|neighbor| {
                let edge = self.edges().get_aggregated_edge(trait_id, neighbor)?;
                if edge.rg_z_meta.abs() <= rg_z_threshold {
                    return None;
                }

                let node = self.traits().get_trait_node(neighbor)?;
                let (h2_meta, h2_z_meta) = (node.h2_meta?, node.h2_z_meta?);
                if h2_z_meta <= h2_z_threshold {
                    return None;
                }

                Some(PrioritizedNeighbor {
                    trait_id: neighbor.clone(),
                    domain: node.domain,
                    rg_meta: edge.rg_meta,
                    rg_z_meta: edge.rg_z_meta,
                    h2_meta,
                    h2_z_meta,
                    score: edge.rg_meta * edge.rg_meta * h2_meta,
                    correlation_count: edge.correlation_count,
                })
            })
            .collect();

        sort_neighbors(&mut ranked);
        debug!(
            "{} of {} neighbors of {} passed the filters",
            ranked.len(),
            neighbors.len(),
            trait_id
        );
        ranked
    }

    /// Edge provenance between two traits, with each study pair joined to
    /// its study records.
    pub fn get_edge_provenance(&self, source_trait: &str, target_trait: &str) -> Option<StudyPowerResult> {
        if source_trait == target_trait {
            return None;
        }

        let traits = self.traits();
        let edge = self.edges().get_aggregated_edge(source_trait, target_trait)?;

        let study_pairs: Vec<StudyPairEvidence> = edge
            .provenance
            .iter()
            .map(|p| {
                let (source_id, target_id) = if traits.trait_for_study(p.study_id_1) == Some(source_trait) {
                    (p.study_id_1, p.study_id_2)
                } else {
                    (p.study_id_2, p.study_id_1)
                };
                StudyPairEvidence {
                    source_study_id: source_id,
                    target_study_id: target_id,
                    rg: p.rg,
                    se: p.se,
                    z: p.z,
                    p: p.p,
                    source_study: traits.study_record(source_id),
                    target_study: traits.study_record(target_id),
                }
            })
            .collect();

        let mut studies = HashMap::new();
        for pair in &study_pairs {
            for (id, record) in [
                (pair.source_study_id, &pair.source_study),
                (pair.target_study_id, &pair.target_study),
            ] {
                if let Some(record) = record {
                    studies.entry(id).or_insert(record);
                }
            }
        }

        let sample_sizes: Vec<u64> = studies.values().filter_map(|r| r.sample_size).collect();
        let populations: BTreeSet<String> = studies.values().filter_map(|r| r.population.clone()).collect();
        let pmids: BTreeSet<String> = studies.values().filter_map(|r| r.pmid.clone()).collect();

        Some(StudyPowerResult {
            source_trait: source_trait.to_string(),
            target_trait: target_trait.to_string(),
            rg_meta: edge.rg_meta,
            rg_se_meta: edge.rg_se_meta,
            rg_z_meta: edge.rg_z_meta,
            rg_p_meta: edge.rg_p_meta,
            correlation_count: edge.correlation_count,
            n_valid: edge.n_valid,
            total_sample_size: sample_sizes.iter().sum(),
            min_sample_size: sample_sizes.iter().copied().min(),
            populations: populations.into_iter().collect(),
            pmids: pmids.into_iter().collect(),
            study_pairs,
        })
    }

    /// Resolves `query` and, only when it matches no trait, every
    /// alternative the provider proposes; then merges the prioritized
    /// neighbors of all resolved traits.
    ///
    /// Neighbors that are themselves resolved traits are dropped; a
    /// neighbor reached from several traits keeps its best score.
    pub fn get_neighbors_with_alternatives(
        &self,
        query: &str,
        provider: &dyn SynonymProvider,
        rg_z_threshold: f64,
        h2_z_threshold: f64,
    ) -> ExpandedNeighbors {
        self.expand_neighbors(query, provider, &[], rg_z_threshold, h2_z_threshold)
    }

    /// Same as [`get_neighbors_with_alternatives`](Self::get_neighbors_with_alternatives),
    /// but `explicit` alternatives are tried whether or not `query` resolves.
    pub fn expand_neighbors(
        &self,
        query: &str,
        provider: &dyn SynonymProvider,
        explicit: &[String],
        rg_z_threshold: f64,
        h2_z_threshold: f64,
    ) -> ExpandedNeighbors {
        let primary = self.resolve_trait_id(query);
        let mut alternatives: Vec<String> = explicit.to_vec();
        if primary.resolved_trait_id.is_none() {
            alternatives.extend(provider.propose(query));
        }

        let mut resolutions = vec![primary];
        let mut tried: HashSet<String> = HashSet::from([normalize_query(query)]);
        for alternative in alternatives {
            if tried.insert(normalize_query(&alternative)) {
                resolutions.push(self.resolve_trait_id(&alternative));
            }
        }

        let mut expanded = ExpandedNeighbors {
            resolutions,
            neighbors: Vec::new(),
            sources: BTreeMap::new(),
        };
        let sources: Vec<String> = expanded
            .resolved_trait_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        debug!(
            "'{}' expanded to {} alternatives, {} resolved traits",
            query,
            expanded.resolutions.len() - 1,
            sources.len()
        );

        let mut best: HashMap<String, (PrioritizedNeighbor, &str)> = HashMap::new();
        for source in &sources {
            for neighbor in self.get_prioritized_neighbors(source, rg_z_threshold, h2_z_threshold) {
                if sources.contains(&neighbor.trait_id) {
                    continue;
                }
                match best.get(&neighbor.trait_id) {
                    Some((existing, _)) if existing.score >= neighbor.score => {}
                    _ => {
                        best.insert(neighbor.trait_id.clone(), (neighbor, source.as_str()));
                    }
                }
            }
        }

        let mut neighbors = Vec::with_capacity(best.len());
        for (trait_id, (neighbor, source)) in best {
            expanded.sources.insert(trait_id, source.to_string());
            neighbors.push(neighbor);
        }
        sort_neighbors(&mut neighbors);
        expanded.neighbors = neighbors;
        expanded
    }

    /// Size of the graph; builds it if needed.
    pub fn stats(&self) -> GraphStats {
        let index = self.index();
        let edge_stats = index.edges.build_stats();
        GraphStats {
            heritability_rows: index.traits.row_count(),
            correlation_rows: self.correlations.len(),
            traits: index.traits.trait_count(),
            studies: index.traits.study_count(),
            trait_pairs: index.edges.pair_count(),
            correlations_indexed: edge_stats.indexed,
            correlations_unmapped: edge_stats.unmapped,
            correlations_self_loop: edge_stats.self_loops,
            build_duration_ms: index.build_duration.as_millis(),
        }
    }
}

/// Score descending, then trait id ascending.
fn sort_neighbors(neighbors: &mut [PrioritizedNeighbor]) {
    neighbors.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.trait_id.cmp(&b.trait_id))
    });
}
