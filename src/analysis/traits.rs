//! Heritability aggregation by trait.
//!
//! Groups per-study heritability rows by canonical trait id and pools each
//! group into a [`TraitNode`]. Also owns the `study_id → trait_id` map the
//! edge aggregator is built on.

use crate::analysis::meta::MetaResult;
use crate::models::{HeritabilityRow, StudyRecord, TraitNode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Index over the heritability table.
///
/// Rows stay in the shared arena; buckets hold row indices.
#[derive(Debug, Clone)]
pub struct TraitAggregator {
    rows: Arc<[HeritabilityRow]>,
    /// Trait id → row indices, in table order.
    buckets: HashMap<String, Vec<usize>>,
    /// Trait ids in first-seen order.
    trait_order: Vec<String>,
    study_to_trait: HashMap<i64, String>,
    study_to_row: HashMap<i64, usize>,
}

impl TraitAggregator {
    /// Builds the index in one pass over the table.
    pub fn new(rows: Arc<[HeritabilityRow]>) -> Self {
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        let mut trait_order = Vec::new();
        let mut study_to_trait = HashMap::new();
        let mut study_to_row = HashMap::new();

        for (idx, row) in rows.iter().enumerate() {
            let Some(ref trait_id) = row.trait_id else {
                continue;
            };

            let bucket = buckets.entry(trait_id.clone()).or_insert_with(|| {
                trait_order.push(trait_id.clone());
                Vec::new()
            });
            bucket.push(idx);

            if let Some(study_id) = row.study_id {
                if study_to_trait.insert(study_id, trait_id.clone()).is_some() {
                    debug!("Duplicate study id {} in heritability table; keeping the last row", study_id);
                }
                study_to_row.insert(study_id, idx);
            }
        }

        Self {
            rows,
            buckets,
            trait_order,
            study_to_trait,
            study_to_row,
        }
    }

    /// Meta-analyzes every study of `trait_id` into a node.
    pub fn get_trait_node(&self, trait_id: &str) -> Option<TraitNode> {
        let indices = self.buckets.get(trait_id)?;
        let rows: Vec<&HeritabilityRow> = indices.iter().map(|&i| &self.rows[i]).collect();

        let meta = MetaResult::from_pairs(rows.iter().map(|r| (r.h2_estimate, r.h2_standard_error)));

        let domain = rows.iter().find_map(|r| r.domain.clone());
        let chapter_level = rows.iter().find_map(|r| r.chapter_level.clone());
        let provenance: Vec<StudyRecord> = rows.iter().map(|r| StudyRecord::from(*r)).collect();

        Some(TraitNode {
            trait_id: trait_id.to_string(),
            domain,
            chapter_level,
            h2_meta: meta.theta,
            h2_se_meta: meta.se,
            h2_z_meta: meta.z,
            h2_p_meta: meta.p,
            n_valid: meta.n_valid,
            study_count: provenance.len(),
            provenance,
        })
    }

    /// Study ids attached to a trait, in table order.
    pub fn get_study_ids_for_trait(&self, trait_id: &str) -> Vec<i64> {
        self.buckets
            .get(trait_id)
            .map(|indices| indices.iter().filter_map(|&i| self.rows[i].study_id).collect())
            .unwrap_or_default()
    }

    /// Every canonical trait id, in first-seen order.
    pub fn get_all_trait_ids(&self) -> Vec<String> {
        self.trait_order.clone()
    }

    pub fn contains(&self, trait_id: &str) -> bool {
        self.buckets.contains_key(trait_id)
    }

    /// Map from study id to canonical trait id.
    pub fn study_trait_map(&self) -> &HashMap<i64, String> {
        &self.study_to_trait
    }

    pub fn trait_for_study(&self, study_id: i64) -> Option<&str> {
        self.study_to_trait.get(&study_id).map(String::as_str)
    }

    /// Provenance record of a single study, for joins.
    pub fn study_record(&self, study_id: i64) -> Option<StudyRecord> {
        self.study_to_row
            .get(&study_id)
            .map(|&i| StudyRecord::from(&self.rows[i]))
    }

    /// Rows of a trait, for alias indexing.
    pub(crate) fn rows_for_trait(&self, trait_id: &str) -> impl Iterator<Item = &HeritabilityRow> {
        self.buckets
            .get(trait_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.rows[i])
    }

    pub fn trait_count(&self) -> usize {
        self.trait_order.len()
    }

    pub fn study_count(&self) -> usize {
        self.study_to_trait.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_aggregator() -> TraitAggregator {
        let rows = vec![
            HeritabilityRow {
                domain: Some("Psychiatric".to_string()),
                pmid: Some("111".to_string()),
                sample_size: Some(50_000),
                ..HeritabilityRow::new(1, "Schizophrenia", 0.5, 0.05)
            },
            HeritabilityRow::new(2, "Schizophrenia", 0.45, 0.04),
            HeritabilityRow::new(3, "Bipolar", 0.4, 0.05),
            HeritabilityRow {
                h2_standard_error: Some(0.0),
                ..HeritabilityRow::new(4, "Height", 0.8, 0.0)
            },
            HeritabilityRow {
                study_id: None,
                ..HeritabilityRow::new(0, "Orphan", 0.2, 0.05)
            },
            HeritabilityRow {
                trait_id: None,
                ..HeritabilityRow::new(5, "", 0.2, 0.05)
            },
        ];
        TraitAggregator::new(rows.into())
    }

    #[test]
    fn test_trait_node_pools_studies() {
        let agg = create_test_aggregator();
        let node = agg.get_trait_node("Schizophrenia").unwrap();

        assert_eq!(node.study_count, 2);
        assert_eq!(node.provenance.len(), node.study_count);
        assert_eq!(node.n_valid, 2);
        assert_eq!(node.domain.as_deref(), Some("Psychiatric"));

        let expected = (400.0 * 0.5 + 625.0 * 0.45) / 1025.0;
        assert!((node.h2_meta.unwrap() - expected).abs() < 1e-12);
        assert!((node.h2_se_meta.unwrap() - 1.0 / 1025f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_trait_without_valid_studies_has_no_meta() {
        let agg = create_test_aggregator();
        let node = agg.get_trait_node("Height").unwrap();

        assert_eq!(node.study_count, 1);
        assert_eq!(node.n_valid, 0);
        assert_eq!(node.h2_meta, None);
        assert_eq!(node.h2_z_meta, None);
    }

    #[test]
    fn test_unknown_trait_is_none() {
        let agg = create_test_aggregator();
        assert!(agg.get_trait_node("Unknown").is_none());
        assert!(agg.get_study_ids_for_trait("Unknown").is_empty());
    }

    #[test]
    fn test_study_map_skips_incomplete_rows() {
        let agg = create_test_aggregator();
        let map = agg.study_trait_map();

        assert_eq!(map.len(), 4);
        assert_eq!(map.get(&1).map(String::as_str), Some("Schizophrenia"));
        assert!(!map.contains_key(&5));
        // Rows without a study id are still grouped by trait.
        assert_eq!(agg.get_trait_node("Orphan").unwrap().study_count, 1);
    }

    #[test]
    fn test_projections() {
        let agg = create_test_aggregator();

        assert_eq!(
            agg.get_all_trait_ids(),
            vec!["Schizophrenia", "Bipolar", "Height", "Orphan"]
        );
        assert_eq!(agg.get_study_ids_for_trait("Schizophrenia"), vec![1, 2]);
        assert_eq!(agg.trait_count(), 4);
        assert_eq!(agg.study_record(1).unwrap().sample_size, Some(50_000));
        assert!(agg.study_record(99).is_none());
    }

    #[test]
    fn test_empty_table() {
        let agg = TraitAggregator::new(Vec::<HeritabilityRow>::new().into());
        assert!(agg.get_all_trait_ids().is_empty());
        assert!(agg.study_trait_map().is_empty());
    }
}
