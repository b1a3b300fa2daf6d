// options.rs - Tunables shared by calling, updating and tabulating

use crate::core::alignment::AlignmentConfig;
use crate::output::Sentinels;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Every tunable of the typing core, resolved from defaults, config file and CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Minimum alignment identity (fraction) for a hit to qualify
    pub identity_floor: f64,
    /// Minimum fraction of the allele an alignment must cover to qualify
    pub min_coverage: f64,
    /// Largest shortfall (bases) a partial hit may have and still be extended
    pub extension_threshold: usize,
    pub delimiter: String,
    /// Search adapter name
    pub search: String,
    pub alignment: AlignmentConfig,
    pub search_timeout_secs: Option<f64>,
    /// Number novel alleles automatically during update
    pub auto_append_novel: bool,
    pub threads: Option<usize>,
    pub sentinels: Sentinels,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            identity_floor: 0.90,
            min_coverage: 0.50,
            extension_threshold: 10,
            delimiter: "\t".to_string(),
            search: "parasail".to_string(),
            alignment: AlignmentConfig::default(),
            search_timeout_secs: None,
            auto_append_novel: true,
            threads: None,
            sentinels: Sentinels::default(),
        }
    }
}

impl TypingConfig {
    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            identity_floor: self.identity_floor,
            min_coverage: self.min_coverage,
            timeout: self.search_timeout(),
        }
    }

    pub fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            threshold: self.extension_threshold,
            identity_floor: self.identity_floor,
            auto_append_novel: self.auto_append_novel,
        }
    }

    /// Delimiter as the single byte the table writer needs
    pub fn delimiter_byte(&self) -> Result<u8, String> {
        match self.delimiter.as_bytes() {
            [b'\n'] | [b'\r'] => Err("Delimiter cannot be a line break".to_string()),
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                self.delimiter.escape_default()
            )),
        }
    }
}

/// Parameters of the allele-calling engine
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    pub identity_floor: f64,
    pub min_coverage: f64,
    pub timeout: Option<Duration>,
}

impl Default for CallOptions {
    fn default() -> Self {
        TypingConfig::default().call_options()
    }
}

/// Parameters of the database-update engine
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOptions {
    pub threshold: usize,
    pub identity_floor: f64,
    pub auto_append_novel: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        TypingConfig::default().update_options()
    }
}
