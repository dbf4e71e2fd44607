//! Alternative query strings for traits that fail exact resolution.
//!
//! How alternatives are produced (a curated list, a language model, an
//! ontology service) is up to the implementor; the graph service only
//! retries resolution on whatever is proposed.

use crate::resolver::normalize_query;
use std::collections::HashMap;

/// Proposes alternative query strings (synonyms, broader or narrower
/// terms) for a trait query.
pub trait SynonymProvider {
    fn propose(&self, query: &str) -> Vec<String>;
}

/// Provider that never proposes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSynonyms;

impl SynonymProvider for NoSynonyms {
    fn propose(&self, _query: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Fixed synonym table, keyed by normalized query.
#[derive(Debug, Clone, Default)]
pub struct StaticSynonyms {
    table: HashMap<String, Vec<String>>,
}

impl StaticSynonyms {
    pub fn new(table: &HashMap<String, Vec<String>>) -> Self {
        let table = table
            .iter()
            .map(|(key, alts)| (normalize_query(key), alts.clone()))
            .collect();
        Self { table }
    }
}

impl SynonymProvider for StaticSynonyms {
    fn propose(&self, query: &str) -> Vec<String> {
        let mut proposals: Vec<String> = self
            .table
            .get(&normalize_query(query))
            .cloned()
            .unwrap_or_default();

        let mut seen = std::collections::HashSet::new();
        proposals.retain(|p| seen.insert(normalize_query(p)));
        proposals
    }
}

impl<F> SynonymProvider for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn propose(&self, query: &str) -> Vec<String> {
        self(query)
    }
}
