//! Exact/alias resolution of free-form trait queries.
//!
//! Every canonical trait id and every display label seen in the
//! heritability table is normalized and mapped to the canonical ids it
//! could mean. Queries are matched exactly against that table; there is no
//! fuzzy matching here.

use crate::analysis::TraitAggregator;
use crate::models::{Confidence, ResolutionMethod, ResolutionResult, TraitCandidate};
use std::collections::{BTreeSet, HashMap};

/// Lowercases and reduces a string to its alphanumeric tokens joined by a
/// single space. `"Type-2  Diabetes (T2D)"` becomes `"type 2 diabetes t2d"`.
pub fn normalize_query(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized alias → canonical trait ids.
#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    aliases: HashMap<String, BTreeSet<String>>,
}

impl AliasIndex {
    /// Indexes the ids and display labels of every trait.
    pub fn build(traits: &TraitAggregator) -> Self {
        let mut aliases: HashMap<String, BTreeSet<String>> = HashMap::new();

        for trait_id in traits.get_all_trait_ids() {
            let mut keys = vec![normalize_query(&trait_id)];
            keys.extend(
                traits
                    .rows_for_trait(&trait_id)
                    .filter_map(|row| row.trait_label.as_deref())
                    .map(normalize_query),
            );

            for key in keys.into_iter().filter(|k| !k.is_empty()) {
                aliases.entry(key).or_default().insert(trait_id.clone());
            }
        }

        Self { aliases }
    }

    /// Canonical ids for an already-normalized alias, in lexical order.
    pub fn lookup(&self, normalized: &str) -> Option<&BTreeSet<String>> {
        self.aliases.get(normalized)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Resolves a query against the index.
    pub fn resolve(&self, query: &str, traits: &TraitAggregator) -> ResolutionResult {
        let normalized = normalize_query(query);

        let Some(ids) = self.lookup(&normalized) else {
            return ResolutionResult {
                query: query.to_string(),
                normalized_query: normalized.clone(),
                resolved_trait_id: None,
                method: ResolutionMethod::None,
                confidence: Confidence::Low,
                candidates: Vec::new(),
                rationale: format!("No trait id or label matches '{}'", normalized),
            };
        };

        let candidates: Vec<TraitCandidate> = ids.iter().map(|id| candidate(id, traits)).collect();
        let resolved = ids.iter().next().cloned();

        let (confidence, rationale) = if candidates.len() == 1 {
            (
                Confidence::High,
                format!("'{}' is an exact alias of a single trait", normalized),
            )
        } else {
            (
                Confidence::Low,
                format!(
                    "'{}' is shared by {} traits; picked the first, check the candidates",
                    normalized,
                    candidates.len()
                ),
            )
        };

        ResolutionResult {
            query: query.to_string(),
            normalized_query: normalized,
            resolved_trait_id: resolved,
            method: ResolutionMethod::Alias,
            confidence,
            candidates,
            rationale,
        }
    }
}

fn candidate(trait_id: &str, traits: &TraitAggregator) -> TraitCandidate {
    let rows: Vec<_> = traits.rows_for_trait(trait_id).collect();
    TraitCandidate {
        trait_id: trait_id.to_string(),
        domain: rows.iter().find_map(|r| r.domain.clone()),
        chapter_level: rows.iter().find_map(|r| r.chapter_level.clone()),
        study_count: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HeritabilityRow;

    fn create_test_traits() -> TraitAggregator {
        let rows = vec![
            HeritabilityRow {
                trait_label: Some("Schizophrenia (SCZ)".to_string()),
                domain: Some("Psychiatric".to_string()),
                ..HeritabilityRow::new(1, "SCZ_2014", 0.5, 0.05)
            },
            HeritabilityRow {
                trait_label: Some("Type 2 diabetes".to_string()),
                ..HeritabilityRow::new(2, "T2D_males", 0.2, 0.02)
            },
            HeritabilityRow {
                trait_label: Some("Type-2 Diabetes".to_string()),
                ..HeritabilityRow::new(3, "T2D_females", 0.25, 0.02)
            },
            HeritabilityRow::new(4, "Bipolar disorder", 0.4, 0.05),
        ];
        TraitAggregator::new(rows.into())
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Type-2   Diabetes (T2D) "), "type 2 diabetes t2d");
        assert_eq!(normalize_query("SCZ_2014"), "scz 2014");
        assert_eq!(normalize_query("---"), "");
    }

    #[test]
    fn test_resolve_by_label() {
        let traits = create_test_traits();
        let index = AliasIndex::build(&traits);
        let result = index.resolve("schizophrenia scz", &traits);

        assert_eq!(result.resolved_trait_id.as_deref(), Some("SCZ_2014"));
        assert_eq!(result.method, ResolutionMethod::Alias);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.candidates[0].domain.as_deref(), Some("Psychiatric"));
    }

    #[test]
    fn test_resolve_by_canonical_id() {
        let traits = create_test_traits();
        let index = AliasIndex::build(&traits);
        let result = index.resolve("BIPOLAR-disorder", &traits);

        assert_eq!(result.resolved_trait_id.as_deref(), Some("Bipolar disorder"));
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_ambiguous_alias_is_low_confidence() {
        let traits = create_test_traits();
        let index = AliasIndex::build(&traits);
        let result = index.resolve("type 2 diabetes", &traits);

        assert!(result.is_ambiguous());
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.method, ResolutionMethod::Alias);
        assert_eq!(result.resolved_trait_id.as_deref(), Some("T2D_females"));
        let ids: Vec<_> = result.candidates.iter().map(|c| c.trait_id.as_str()).collect();
        assert_eq!(ids, vec!["T2D_females", "T2D_males"]);
    }

    #[test]
    fn test_no_match() {
        let traits = create_test_traits();
        let index = AliasIndex::build(&traits);
        let result = index.resolve("height", &traits);

        assert_eq!(result.resolved_trait_id, None);
        assert_eq!(result.method, ResolutionMethod::None);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.candidates.is_empty());
    }
}
