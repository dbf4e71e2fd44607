//! Genetic correlation aggregation by unordered trait pair.
//!
//! One pass over the correlation table maps both study ids to traits,
//! drops unmapped rows and self-loops, and buckets the remaining rows under
//! a normalized pair key. Edges are pooled on demand from those buckets.

use crate::analysis::meta::MetaResult;
use crate::models::{AggregatedEdge, CorrelationRow, EdgeProvenance};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Normalized unordered trait pair; the smaller id always comes first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraitPair(String, String);

impl TraitPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }

    pub fn into_tuple(self) -> (String, String) {
        (self.0, self.1)
    }
}

/// Counters from the build pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeBuildStats {
    /// Rows bucketed under a trait pair.
    pub indexed: usize,
    /// Rows with a missing or unknown study id.
    pub unmapped: usize,
    /// Rows whose two studies belong to the same trait.
    pub self_loops: usize,
}

/// Index over the correlation table.
#[derive(Debug, Clone)]
pub struct EdgeAggregator {
    rows: Arc<[CorrelationRow]>,
    buckets: HashMap<TraitPair, Vec<usize>>,
    adjacency: HashMap<String, BTreeSet<String>>,
    stats: EdgeBuildStats,
}

impl EdgeAggregator {
    /// Builds the pair index from the correlation table and the
    /// `study_id → trait_id` map of the trait aggregator.
    pub fn new(rows: Arc<[CorrelationRow]>, study_to_trait: &HashMap<i64, String>) -> Self {
        let mut buckets: HashMap<TraitPair, Vec<usize>> = HashMap::new();
        let mut adjacency: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut stats = EdgeBuildStats::default();

        for (idx, row) in rows.iter().enumerate() {
            let lookup = |id: Option<i64>| id.and_then(|id| study_to_trait.get(&id));
            let (Some(trait_1), Some(trait_2)) = (lookup(row.study_id_1), lookup(row.study_id_2)) else {
                stats.unmapped += 1;
                continue;
            };

            if trait_1 == trait_2 {
                stats.self_loops += 1;
                continue;
            }

            buckets.entry(TraitPair::new(trait_1, trait_2)).or_default().push(idx);
            adjacency.entry(trait_1.clone()).or_default().insert(trait_2.clone());
            adjacency.entry(trait_2.clone()).or_default().insert(trait_1.clone());
            stats.indexed += 1;
        }

        debug!(
            "Edge index: {} pairs from {} rows ({} unmapped, {} self-loops)",
            buckets.len(),
            stats.indexed,
            stats.unmapped,
            stats.self_loops
        );

        Self {
            rows,
            buckets,
            adjacency,
            stats,
        }
    }

    /// Traits sharing at least one correlation row with `trait_id`, in
    /// lexical order.
    pub fn get_neighbor_traits(&self, trait_id: &str) -> Vec<String> {
        self.adjacency
            .get(trait_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every normalized pair with at least one contributing row.
    pub fn get_all_trait_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<&TraitPair> = self.buckets.keys().collect();
        pairs.sort();
        pairs.into_iter().cloned().map(TraitPair::into_tuple).collect()
    }

    /// Pools every study pair behind `(trait_a, trait_b)`.
    ///
    /// Order of the arguments does not matter. Returns `None` for
    /// self-pairs, unknown pairs and pairs with no usable estimate.
    pub fn get_aggregated_edge(&self, trait_a: &str, trait_b: &str) -> Option<AggregatedEdge> {
        if trait_a == trait_b {
            return None;
        }

        let key = TraitPair::new(trait_a, trait_b);
        let indices = self.buckets.get(&key)?;
        let rows: Vec<&CorrelationRow> = indices.iter().map(|&i| &self.rows[i]).collect();

        let meta = MetaResult::from_pairs(rows.iter().map(|r| (r.rg_estimate, r.rg_standard_error)));
        let (Some(rg_meta), Some(rg_se_meta), Some(rg_z_meta), Some(rg_p_meta)) =
            (meta.theta, meta.se, meta.z, meta.p)
        else {
            return None;
        };

        // Bucketed rows always carry both study ids.
        let provenance: Vec<EdgeProvenance> = rows
            .iter()
            .filter_map(|r| {
                Some(EdgeProvenance {
                    study_id_1: r.study_id_1?,
                    study_id_2: r.study_id_2?,
                    rg: r.rg_estimate,
                    se: r.rg_standard_error,
                    z: r.rg_z,
                    p: r.rg_p,
                })
            })
            .collect();

        let (trait_a, trait_b) = key.into_tuple();
        Some(AggregatedEdge {
            trait_a,
            trait_b,
            rg_meta,
            rg_se_meta,
            rg_z_meta,
            rg_p_meta,
            n_valid: meta.n_valid,
            correlation_count: provenance.len(),
            provenance,
        })
    }

    pub fn pair_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn build_stats(&self) -> EdgeBuildStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn study_map() -> HashMap<i64, String> {
        [
            (1, "Schizophrenia"),
            (2, "Schizophrenia"),
            (3, "Bipolar"),
            (4, "Height"),
            (5, "Bipolar"),
        ]
        .into_iter()
        .map(|(id, t)| (id, t.to_string()))
        .collect()
    }

    fn create_test_aggregator(rows: Vec<CorrelationRow>) -> EdgeAggregator {
        EdgeAggregator::new(rows.into(), &study_map())
    }

    #[test]
    fn test_single_row_edge() {
        let agg = create_test_aggregator(vec![CorrelationRow::new(1, 3, 0.6, 0.1)]);
        let edge = agg.get_aggregated_edge("Schizophrenia", "Bipolar").unwrap();

        assert_eq!(edge.trait_a, "Bipolar");
        assert_eq!(edge.trait_b, "Schizophrenia");
        assert_eq!(edge.correlation_count, 1);
        assert_eq!(edge.rg_meta, 0.6);
        assert_eq!(edge.rg_se_meta, 0.1);
    }

    #[test]
    fn test_lookup_is_symmetric() {
        let agg = create_test_aggregator(vec![
            CorrelationRow::new(1, 3, 0.6, 0.1),
            CorrelationRow::new(5, 2, 0.5, 0.2),
            CorrelationRow::new(4, 1, -0.1, 0.05),
        ]);

        for (a, b) in agg.get_all_trait_pairs() {
            let forward = agg.get_aggregated_edge(&a, &b);
            let backward = agg.get_aggregated_edge(&b, &a);
            assert!(forward.is_some());
            assert_eq!(forward, backward);
        }

        let edge = agg.get_aggregated_edge("Bipolar", "Schizophrenia").unwrap();
        assert_eq!(edge.correlation_count, 2);
        assert_eq!(edge.n_valid, 2);
    }

    #[test]
    fn test_self_loops_are_excluded() {
        // Distinct studies, same trait on both sides.
        let agg = create_test_aggregator(vec![
            CorrelationRow::new(1, 2, 0.9, 0.01),
            CorrelationRow::new(3, 5, 0.8, 0.02),
        ]);

        assert!(agg.get_aggregated_edge("Schizophrenia", "Schizophrenia").is_none());
        assert!(agg.get_aggregated_edge("Bipolar", "Bipolar").is_none());
        assert!(agg.get_all_trait_pairs().is_empty());
        assert!(agg.get_neighbor_traits("Schizophrenia").is_empty());
        assert_eq!(agg.build_stats().self_loops, 2);
    }

    #[test]
    fn test_unmapped_studies_contribute_nothing() {
        let agg = create_test_aggregator(vec![
            CorrelationRow::new(1, 99, 0.9, 0.01),
            CorrelationRow {
                study_id_2: None,
                ..CorrelationRow::new(3, 0, 0.9, 0.01)
            },
        ]);

        assert_eq!(agg.pair_count(), 0);
        assert_eq!(agg.build_stats().unmapped, 2);
        assert!(agg.get_neighbor_traits("Schizophrenia").is_empty());
    }

    #[test]
    fn test_provenance_keeps_invalid_rows() {
        let agg = create_test_aggregator(vec![
            CorrelationRow::new(1, 3, 0.6, 0.1),
            CorrelationRow::new(2, 5, 0.4, 0.0),
            CorrelationRow {
                rg_estimate: None,
                ..CorrelationRow::new(2, 3, 0.0, 0.1)
            },
        ]);

        let edge = agg.get_aggregated_edge("Bipolar", "Schizophrenia").unwrap();
        assert_eq!(edge.correlation_count, 3);
        assert_eq!(edge.provenance.len(), 3);
        assert_eq!(edge.n_valid, 1);
        assert_eq!(edge.rg_meta, 0.6);
    }

    #[test]
    fn test_edge_without_valid_rows_is_none() {
        let agg = create_test_aggregator(vec![CorrelationRow::new(1, 4, 0.3, -0.1)]);

        assert_eq!(agg.get_all_trait_pairs().len(), 1);
        assert!(agg.get_aggregated_edge("Height", "Schizophrenia").is_none());
    }

    #[test]
    fn test_neighbors() {
        let agg = create_test_aggregator(vec![
            CorrelationRow::new(1, 4, 0.3, 0.1),
            CorrelationRow::new(3, 2, 0.6, 0.1),
        ]);

        assert_eq!(agg.get_neighbor_traits("Schizophrenia"), vec!["Bipolar", "Height"]);
        assert_eq!(agg.get_neighbor_traits("Height"), vec!["Schizophrenia"]);
        assert!(agg.get_neighbor_traits("Unknown").is_empty());
    }

    #[test]
    fn test_trait_pair_normalization() {
        assert_eq!(TraitPair::new("b", "a"), TraitPair::new("a", "b"));
        assert_eq!(
            TraitPair::new("b", "a").into_tuple(),
            ("a".to_string(), "b".to_string())
        );
    }
}
