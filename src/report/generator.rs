//! Markdown report generation.
//!
//! This module renders a [`QueryReport`] as Markdown or JSON. Missing
//! heritability data and empty neighbor lists are reported as findings,
//! not errors.

use super::{QueryReport, ReportMetadata};
use crate::models::{
    Confidence, PrioritizedNeighbor, ResolutionResult, StudyPowerResult, StudyRecord, TraitNode,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &QueryReport) -> String {
    let mut output = String::new();

    // Title
    match report.trait_id() {
        Some(trait_id) => output.push_str(&format!("# TraitGraph Report: {}\n\n", trait_id)),
        None => output.push_str(&format!("# TraitGraph Report: \"{}\"\n\n", report.resolution.query)),
    }

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_resolution_section(&report.resolution, &report.alternatives));

    if report.trait_id().is_some() || !report.neighbors.is_empty() {
        output.push_str(&generate_heritability_section(report.trait_node.as_ref()));
        output.push_str(&generate_neighbors_section(&report.neighbors));
    }

    output.push_str(&generate_provenance_section(&report.provenance));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Heritability Table:** `{}`\n", metadata.heritability_source));
    section.push_str(&format!("- **Correlation Table:** `{}`\n", metadata.correlation_source));
    section.push_str(&format!(
        "- **Graph:** {} traits, {} studies, {} trait pairs\n",
        metadata.stats.traits, metadata.stats.studies, metadata.stats.trait_pairs
    ));
    if metadata.stats.correlations_unmapped > 0 || metadata.stats.correlations_self_loop > 0 {
        section.push_str(&format!(
            "- **Correlations Skipped:** {} unmapped, {} self-loops\n",
            metadata.stats.correlations_unmapped, metadata.stats.correlations_self_loop
        ));
    }
    section.push_str(&format!(
        "- **Thresholds:** |rg Z| > {}, h2 Z > {}\n",
        metadata.rg_z_threshold, metadata.h2_z_threshold
    ));
    section.push('\n');

    section
}

/// Generate the resolution section.
fn generate_resolution_section(resolution: &ResolutionResult, alternatives: &[ResolutionResult]) -> String {
    let mut section = String::new();

    section.push_str("## Resolution\n\n");
    section.push_str(&format!("- **Query:** {}\n", resolution.query));
    match resolution.resolved_trait_id {
        Some(ref id) => section.push_str(&format!("- **Trait:** {}\n", id)),
        None => section.push_str("- **Trait:** not found\n"),
    }
    section.push_str(&format!(
        "- **Method:** {} ({} confidence)\n",
        resolution.method, resolution.confidence
    ));
    section.push_str(&format!("- **Rationale:** {}\n\n", resolution.rationale));

    if resolution.is_ambiguous() {
        section.push_str("### Candidates\n\n");
        section.push_str("| Trait | Domain | Chapter | Studies |\n");
        section.push_str("|:---|:---|:---|:---:|\n");
        for c in &resolution.candidates {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                c.trait_id,
                c.domain.as_deref().unwrap_or("-"),
                c.chapter_level.as_deref().unwrap_or("-"),
                c.study_count
            ));
        }
        section.push('\n');
    }

    if !alternatives.is_empty() {
        section.push_str("### Alternative Queries\n\n");
        for alt in alternatives {
            let outcome = match (&alt.resolved_trait_id, alt.confidence) {
                (Some(id), Confidence::High) => id.clone(),
                (Some(id), Confidence::Low) => format!("{} (ambiguous)", id),
                (None, _) => "not found".to_string(),
            };
            section.push_str(&format!("- {} → {}\n", alt.query, outcome));
        }
        section.push('\n');
    }

    section
}

/// Generate the heritability section.
fn generate_heritability_section(node: Option<&TraitNode>) -> String {
    let mut section = String::new();

    section.push_str("## Heritability\n\n");

    let Some(node) = node else {
        section.push_str("No heritability data for this trait.\n\n");
        return section;
    };

    if let Some(ref domain) = node.domain {
        section.push_str(&format!("*Domain: {}*\n\n", domain));
    }

    match node.h2_meta {
        Some(h2) => {
            section.push_str(&format!(
                "**h2 = {:.4}** (SE {}, Z {}, p {}) pooled from {} of {} studies\n\n",
                h2,
                fmt_opt(node.h2_se_meta, 4),
                fmt_opt(node.h2_z_meta, 2),
                fmt_p(node.h2_p_meta),
                node.n_valid,
                node.study_count
            ));
        }
        None => {
            section.push_str(&format!(
                "No study of this trait has a usable heritability estimate ({} studies).\n\n",
                node.study_count
            ));
        }
    }

    if !node.provenance.is_empty() {
        section.push_str("| Study | h2 | SE | N | Population | PMID |\n");
        section.push_str("|:---|:---:|:---:|:---:|:---|:---|\n");
        for study in &node.provenance {
            section.push_str(&generate_study_row(study));
        }
        section.push('\n');
    }

    section
}

fn generate_study_row(study: &StudyRecord) -> String {
    format!(
        "| {} | {} | {} | {} | {} | {} |\n",
        study.study_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
        fmt_opt(study.h2_estimate, 3),
        fmt_opt(study.h2_standard_error, 3),
        study.sample_size.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
        study.population.as_deref().unwrap_or("-"),
        study.pmid.as_deref().unwrap_or("-"),
    )
}

/// Generate the neighbors section.
fn generate_neighbors_section(neighbors: &[PrioritizedNeighbor]) -> String {
    let mut section = String::new();

    section.push_str("## Prioritized Neighbors\n\n");

    if neighbors.is_empty() {
        section.push_str("No neighbors found that pass both significance filters.\n\n");
        return section;
    }

    section.push_str("| # | Trait | rg | rg Z | h2 | h2 Z | Score | Pairs |\n");
    section.push_str("|:---:|:---|:---:|:---:|:---:|:---:|:---:|:---:|\n");

    for (i, n) in neighbors.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {:.3} | {:.2} | {:.3} | {:.2} | {:.4} | {} |\n",
            i + 1,
            n.trait_id,
            n.rg_meta,
            n.rg_z_meta,
            n.h2_meta,
            n.h2_z_meta,
            n.score,
            n.correlation_count
        ));
    }
    section.push('\n');

    section
}

/// Generate the edge provenance section.
fn generate_provenance_section(provenance: &[StudyPowerResult]) -> String {
    if provenance.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Edge Provenance\n\n");

    for edge in provenance {
        section.push_str(&generate_edge_block(edge));
    }

    section
}

/// Generate a single edge block.
fn generate_edge_block(edge: &StudyPowerResult) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {} ↔ {}\n\n", edge.source_trait, edge.target_trait));
    block.push_str(&format!(
        "**rg = {:.3}** (SE {:.3}, Z {:.2}, p {}) from {} of {} study pairs\n\n",
        edge.rg_meta,
        edge.rg_se_meta,
        edge.rg_z_meta,
        fmt_p(Some(edge.rg_p_meta)),
        edge.n_valid,
        edge.correlation_count
    ));

    let min_n = edge
        .min_sample_size
        .map(|n| format!(", smallest study N = {}", n))
        .unwrap_or_default();
    block.push_str(&format!("*Total N = {}{}*\n\n", edge.total_sample_size, min_n));

    if !edge.populations.is_empty() {
        block.push_str(&format!("**Populations:** {}\n\n", edge.populations.join(", ")));
    }
    if !edge.pmids.is_empty() {
        block.push_str(&format!("**PMIDs:** {}\n\n", edge.pmids.join(", ")));
    }

    block.push_str("| Source Study | Target Study | rg | SE | p |\n");
    block.push_str("|:---|:---|:---:|:---:|:---:|\n");
    for pair in &edge.study_pairs {
        block.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            pair.source_study_id,
            pair.target_study_id,
            fmt_opt(pair.rg, 3),
            fmt_opt(pair.se, 3),
            fmt_p(pair.p)
        ));
    }
    block.push_str("\n---\n\n");

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    "*Report generated by TraitGraph*\n".to_string()
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_p(value: Option<f64>) -> String {
    match value {
        Some(p) if p < 1e-3 => format!("{:.2e}", p),
        Some(p) => format!("{:.3}", p),
        None => "-".to_string(),
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &QueryReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
