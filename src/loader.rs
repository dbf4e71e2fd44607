//! CSV/TSV table loading.
//!
//! Parses heritability and correlation tables with header rows into the
//! row types the graph is built from. Unparseable numeric cells become
//! absent values and blank text becomes `None`; malformed rows never abort
//! the load.

use crate::error::{GraphError, Result};
use crate::models::{CorrelationRow, HeritabilityRow};
use csv::ReaderBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for loading a table.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Field delimiter; picked from the file extension when `None`.
    pub delimiter: Option<u8>,
    /// Whether to show a spinner while reading.
    pub show_progress: bool,
}

#[derive(Debug, Deserialize)]
struct RawHeritabilityRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    study_id: Option<i64>,
    #[serde(default, alias = "trait")]
    trait_id: Option<String>,
    #[serde(default, alias = "trait_name", alias = "label")]
    trait_label: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option", alias = "h2")]
    h2_estimate: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option", alias = "h2_se")]
    h2_standard_error: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    h2_z: Option<f64>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    chapter_level: Option<String>,
    #[serde(default)]
    pmid: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option", alias = "n")]
    sample_size: Option<u64>,
    #[serde(default)]
    population: Option<String>,
    #[serde(default)]
    consortium: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    year: Option<i32>,
}

impl From<RawHeritabilityRow> for HeritabilityRow {
    fn from(raw: RawHeritabilityRow) -> Self {
        HeritabilityRow {
            study_id: raw.study_id,
            trait_id: raw.trait_id,
            trait_label: raw.trait_label,
            h2_estimate: raw.h2_estimate,
            h2_standard_error: raw.h2_standard_error,
            h2_z: raw.h2_z,
            domain: raw.domain,
            chapter_level: raw.chapter_level,
            pmid: raw.pmid,
            sample_size: raw.sample_size,
            population: raw.population,
            consortium: raw.consortium,
            year: raw.year,
        }
        .sanitized()
    }
}

#[derive(Debug, Deserialize)]
struct RawCorrelationRow {
    #[serde(default, deserialize_with = "csv::invalid_option", alias = "study1")]
    study_id_1: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option", alias = "study2")]
    study_id_2: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option", alias = "rg")]
    rg_estimate: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option", alias = "rg_se")]
    rg_standard_error: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rg_z: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rg_p: Option<f64>,
}

impl From<RawCorrelationRow> for CorrelationRow {
    fn from(raw: RawCorrelationRow) -> Self {
        CorrelationRow {
            study_id_1: raw.study_id_1,
            study_id_2: raw.study_id_2,
            rg_estimate: raw.rg_estimate,
            rg_standard_error: raw.rg_standard_error,
            rg_z: raw.rg_z,
            rg_p: raw.rg_p,
        }
        .sanitized()
    }
}

/// Load the heritability table.
pub fn load_heritability(path: &Path, options: &LoadOptions) -> Result<Vec<HeritabilityRow>> {
    load_table::<RawHeritabilityRow, HeritabilityRow>(path, options, "heritability")
}

/// Load the genetic correlation table.
pub fn load_correlations(path: &Path, options: &LoadOptions) -> Result<Vec<CorrelationRow>> {
    load_table::<RawCorrelationRow, CorrelationRow>(path, options, "correlation")
}

/// Delimiter implied by a file extension: tab for `.tsv`/`.txt`, comma
/// otherwise.
pub fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("txt") | Some("tab") => b'\t',
        _ => b',',
    }
}

fn load_table<R, T>(path: &Path, options: &LoadOptions, kind: &str) -> Result<Vec<T>>
where
    R: DeserializeOwned,
    T: From<R>,
{
    let file = File::open(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let delimiter = options.delimiter.unwrap_or_else(|| delimiter_for(path));
    debug!(
        "Reading {} table {} (delimiter {:?})",
        kind,
        path.display(),
        delimiter as char
    );

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    // Header problems are fatal; row problems are not.
    reader.headers().map_err(|source| GraphError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let spinner = options.show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (line, record) in reader.deserialize::<R>().enumerate() {
        match record {
            Ok(raw) => rows.push(T::from(raw)),
            Err(e) => {
                skipped += 1;
                debug!("Skipping {} row {}: {}", kind, line + 2, e);
            }
        }

        if let Some(ref pb) = spinner {
            if rows.len() % 50_000 == 0 {
                pb.set_message(format!("Loading {} table: {} rows", kind, rows.len()));
            }
        }
    }

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if skipped > 0 {
        warn!("Skipped {} unreadable rows in {}", skipped, path.display());
    }
    info!("Loaded {} {} rows from {}", rows.len(), kind, path.display());

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Confidence;
    use crate::service::KnowledgeGraphService;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_heritability_tsv() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "h2.tsv",
            "study_id\ttrait_id\th2_estimate\th2_standard_error\tdomain\tsample_size\n\
             1\tSchizophrenia\t0.5\t0.05\tPsychiatric\t40000\n\
             2\tSchizophrenia\tNA\t0.04\t\t\n\
             \tBipolar\t0.4\t0.05\t\tunknown\n",
        );

        let rows = load_heritability(&path, &LoadOptions::default()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].study_id, Some(1));
        assert_eq!(rows[0].domain.as_deref(), Some("Psychiatric"));
        assert_eq!(rows[0].sample_size, Some(40_000));
        assert_eq!(rows[1].h2_estimate, None);
        assert_eq!(rows[1].domain, None);
        assert_eq!(rows[2].study_id, None);
        assert_eq!(rows[2].sample_size, None);
        assert_eq!(rows[2].trait_id.as_deref(), Some("Bipolar"));
    }

    #[test]
    fn test_load_correlations_csv_with_aliases() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "rg.csv",
            "study1,study2,rg,rg_se,rg_p\n1,3,0.6,0.1,1e-9\n1,x,0.2,0.1,0.05\n",
        );

        let rows = load_correlations(&path, &LoadOptions::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], CorrelationRow { rg_p: Some(1e-9), ..CorrelationRow::new(1, 3, 0.6, 0.1) });
        assert_eq!(rows[1].study_id_2, None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_correlations(Path::new("/nonexistent/rg.tsv"), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }

    #[test]
    fn test_delimiter_for() {
        assert_eq!(delimiter_for(Path::new("a.tsv")), b'\t');
        assert_eq!(delimiter_for(Path::new("a.TXT")), b'\t');
        assert_eq!(delimiter_for(Path::new("a.csv")), b',');
        assert_eq!(delimiter_for(Path::new("a")), b',');
    }

    #[test]
    fn test_fixture_tables_build_graph() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        let options = LoadOptions::default();
        let heritability = load_heritability(&root.join("heritability.tsv"), &options).unwrap();
        let correlations = load_correlations(&root.join("correlations.tsv"), &options).unwrap();
        assert_eq!(heritability.len(), 12);
        assert_eq!(correlations.len(), 18);

        let service = KnowledgeGraphService::new(heritability, correlations);
        let stats = service.warm_up();
        assert_eq!(stats.traits, 10);
        assert_eq!(stats.studies, 12);
        assert_eq!(stats.correlations_unmapped, 1);
        assert_eq!(stats.correlations_self_loop, 1);
        assert_eq!(stats.correlations_indexed, 16);

        let scz = service.get_trait_node("Schizophrenia").unwrap();
        assert_eq!(scz.study_count, 2);
        assert_eq!(scz.n_valid, 2);
        assert_eq!(scz.domain.as_deref(), Some("Psychiatric"));

        // Autism has a zero standard error and is never pooled.
        assert_eq!(service.get_trait_node("Autism spectrum disorder").unwrap().h2_meta, None);

        for query in ["Type 2 diabetes", "type-2 diabetes", "TYPE 2 DIABETES"] {
            let resolution = service.resolve_trait_id(query);
            assert_eq!(resolution.resolved_trait_id.as_deref(), Some("Type 2 diabetes"));
            assert_eq!(resolution.confidence, Confidence::High);
        }
        assert_eq!(
            service.resolve_trait_id("BMI").resolved_trait_id.as_deref(),
            Some("Body mass index")
        );
        assert_eq!(
            service.resolve_trait_id("schizophrenia (SCZ)").resolved_trait_id.as_deref(),
            Some("Schizophrenia")
        );

        let neighbors = service.get_prioritized_neighbors("Schizophrenia", 2.0, 2.0);
        assert_eq!(neighbors[0].trait_id, "Bipolar disorder");
        assert!(neighbors.iter().all(|n| n.trait_id != "Type 2 diabetes"));
        assert!(neighbors.iter().all(|n| n.trait_id != "Autism spectrum disorder"));
    }
}
