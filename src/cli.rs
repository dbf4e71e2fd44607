//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and merging over the configuration file.

use clap::Parser;
use std::path::PathBuf;
use traitgraph::config::Config;

/// TraitGraph - meta-analyzed heritability and genetic correlation neighbors
///
/// Resolve a trait, pool its heritability across studies, and rank the
/// genetically correlated traits most useful for model transfer.
///
/// Examples:
///   traitgraph schizophrenia --heritability h2.tsv --correlations rg.tsv
///   traitgraph "type 2 diabetes" --alt T2D --rg-z 3 --limit 10
///   traitgraph schizophrenia --target "bipolar disorder" --format json
///   traitgraph --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Trait to look up (canonical id or display label)
    #[arg(value_name = "TRAIT", required_unless_present = "init_config")]
    pub query: Option<String>,

    /// Heritability table (CSV or TSV with a header row)
    #[arg(long, value_name = "FILE", env = "TRAITGRAPH_HERITABILITY")]
    pub heritability: Option<PathBuf>,

    /// Genetic correlation table (CSV or TSV with a header row)
    #[arg(long, value_name = "FILE", env = "TRAITGRAPH_CORRELATIONS")]
    pub correlations: Option<PathBuf>,

    /// Field delimiter for both tables
    ///
    /// Inferred from the file extension when omitted (.tsv/.txt → tab).
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Show edge provenance between the trait and this target instead of
    /// ranking neighbors
    #[arg(short, long, value_name = "TRAIT")]
    pub target: Option<String>,

    /// Alternative query strings to try as well (comma-separated)
    ///
    /// Example: --alt SCZ,psychosis
    #[arg(long, value_name = "QUERIES", value_delimiter = ',')]
    pub alt: Vec<String>,

    /// Minimum |Z| of the pooled genetic correlation
    #[arg(long = "rg-z", value_name = "Z")]
    pub rg_z_threshold: Option<f64>,

    /// Minimum Z of the neighbor's pooled heritability
    #[arg(long = "h2-z", value_name = "Z")]
    pub h2_z_threshold: Option<f64>,

    /// Maximum number of neighbors to report
    #[arg(short, long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Number of top neighbors to include edge provenance for
    #[arg(long, value_name = "COUNT")]
    pub provenance_top: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .traitgraph.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .traitgraph.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The trait query; empty when only `--init-config` was given.
    pub fn query(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.query().trim().is_empty() {
            return Err("Trait query must not be empty".to_string());
        }

        for (name, value) in [("--rg-z", self.rg_z_threshold), ("--h2-z", self.h2_z_threshold)] {
            if let Some(z) = value {
                if !z.is_finite() || z < 0.0 {
                    return Err(format!("{} must be a non-negative number", name));
                }
            }
        }

        if self.limit == Some(0) {
            return Err("Limit must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(d) = self.delimiter {
            if !d.is_ascii() {
                return Err("Delimiter must be a single ASCII character".to_string());
            }
        }

        for path in [&self.heritability, &self.correlations].into_iter().flatten() {
            if !path.is_file() {
                return Err(format!("Table file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Merge these arguments over a configuration.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref path) = self.heritability {
            config.data.heritability = Some(path.clone());
        }
        if let Some(ref path) = self.correlations {
            config.data.correlations = Some(path.clone());
        }
        if self.delimiter.is_some() {
            config.data.delimiter = self.delimiter;
        }

        if let Some(z) = self.rg_z_threshold {
            config.query.rg_z_threshold = z;
        }
        if let Some(z) = self.h2_z_threshold {
            config.query.h2_z_threshold = z;
        }
        if let Some(limit) = self.limit {
            config.query.max_neighbors = limit;
        }
        if let Some(top) = self.provenance_top {
            config.query.provenance_top = top;
        }

        if self.output.is_some() {
            config.general.output = self.output.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            query: Some("schizophrenia".to_string()),
            heritability: None,
            correlations: None,
            delimiter: None,
            target: None,
            alt: Vec::new(),
            rg_z_threshold: None,
            h2_z_threshold: None,
            limit: None,
            provenance_top: None,
            format: OutputFormat::Markdown,
            output: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "traitgraph",
            "type 2 diabetes",
            "--alt",
            "T2D,diabetes",
            "--rg-z",
            "3",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.query(), "type 2 diabetes");
        assert_eq!(args.alt, vec!["T2D", "diabetes"]);
        assert_eq!(args.rg_z_threshold, Some(3.0));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_query_required_unless_init_config() {
        assert!(Args::try_parse_from(["traitgraph"]).is_err());
        assert!(Args::try_parse_from(["traitgraph", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_negative_threshold() {
        let mut args = make_args();
        args.h2_z_threshold = Some(-1.0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_table() {
        let mut args = make_args();
        args.heritability = Some(PathBuf::from("/nonexistent/h2.tsv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_apply_to_overrides_only_given_values() {
        let mut config = Config::default();
        config.query.max_neighbors = 7;

        let mut args = make_args();
        args.rg_z_threshold = Some(4.0);
        args.heritability = Some(PathBuf::from("h2.tsv"));
        args.apply_to(&mut config);

        assert_eq!(config.query.rg_z_threshold, 4.0);
        assert_eq!(config.query.h2_z_threshold, 2.0);
        assert_eq!(config.query.max_neighbors, 7);
        assert_eq!(config.data.heritability, Some(PathBuf::from("h2.tsv")));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
