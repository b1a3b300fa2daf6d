// config.rs - Configuration file support

use crate::output::Sentinels;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    // Calling
    pub identity_floor: Option<f64>,
    pub min_coverage: Option<f64>,
    pub search: Option<String>,
    pub search_timeout_secs: Option<f64>,

    // Alignment settings (parasail search only)
    pub alignment_mode: Option<String>,
    pub match_score: Option<i32>,
    pub mismatch_penalty: Option<i32>,
    pub gap_open: Option<i32>,
    pub gap_extend: Option<i32>,

    // Update
    pub extension_threshold: Option<usize>,
    pub auto_append_novel: Option<bool>,

    // Tabulation
    pub delimiter: Option<String>,
    pub include_loci: Option<String>,
    pub exclude_loci: Option<String>,
    pub sentinels: Option<Sentinels>,

    // Performance
    pub threads: Option<usize>,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample() -> String {
        r#"# mlstcall.toml - Configuration file for mlstcall
# Command line arguments will override these settings

# =============================================================================
# CALLING
# =============================================================================

# Minimum identity (0.0-1.0) for a hit to qualify
identity_floor = 0.90

# Minimum fraction of the allele length a hit must cover to qualify
min_coverage = 0.50

# Search adapter: parasail, exact
search = "parasail"

# Per-locus search timeout in seconds (omit for no timeout)
# search_timeout_secs = 30.0

# =============================================================================
# ALIGNMENT SETTINGS (parasail search only)
# =============================================================================

# Alignment mode: dna, dna-strict, dna-permissive
alignment_mode = "dna"

# Custom alignment scores (overrides preset mode)
# match_score = 2
# mismatch_penalty = -1
# gap_open = 5
# gap_extend = 2

# =============================================================================
# UPDATE
# =============================================================================

# Largest shortfall (bases) a partial call may have and still be extended
extension_threshold = 10

# Number novel alleles and rewrite their calls as exact matches
auto_append_novel = true

# =============================================================================
# TABULATION
# =============================================================================

# Column delimiter (single character)
delimiter = "\t"

# Include only loci matching regex pattern
# include_loci = "INNUENDO.*"

# Exclude loci matching regex pattern
# exclude_loci = "deprecated.*"

# =============================================================================
# PERFORMANCE
# =============================================================================

# Number of threads (omit for auto-detection)
# threads = 8

# =============================================================================
# CELL MARKERS (tabulation)
# =============================================================================

[sentinels]
absent = "-"
not_tested = "NA"
partial = "PARTIAL"
failed = "ERROR"
new_prefix = "NEW_"
"#
        .to_string()
    }
}
