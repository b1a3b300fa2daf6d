// validation.rs - Input validation utilities

use crate::cli::args::{Args, Command};
use crate::cli::merge::Settings;
use crate::core::{AlignmentConfig, TypingConfig};
use crate::search::SearchRegistry;
use regex::Regex;
use std::path::Path;

pub struct ValidationResult {
    pub config: TypingConfig,
    pub delimiter: u8,
    pub loci_include_regex: Option<Regex>,
    pub loci_exclude_regex: Option<Regex>,
}

fn check_fraction(name: &str, value: f64) -> Result<(), String> {
    if value.is_nan() || value <= 0.0 || value > 1.0 {
        return Err(format!("{} must be in (0.0, 1.0], got {}", name, value));
    }
    Ok(())
}

fn compile_regex(name: &str, pattern: Option<&str>) -> Result<Option<Regex>, String> {
    pattern
        .map(|p| Regex::new(p).map_err(|e| format!("Invalid {} regex: {}", name, e)))
        .transpose()
}

fn require_dir(flag: &str, path: &str) -> Result<(), String> {
    if !Path::new(path).is_dir() {
        return Err(format!("{} '{}' is not a directory", flag, path));
    }
    Ok(())
}

/// Check that the input paths of a command exist
fn validate_paths(command: &Command) -> Result<(), String> {
    match command {
        Command::Call(call) => {
            if !Path::new(&call.input).exists() {
                return Err(format!("--input '{}' does not exist", call.input));
            }
            require_dir("--alleles", &call.alleles)
        }
        Command::Update(update) => {
            require_dir("--alleles", &update.alleles)?;
            require_dir("--json", &update.json)?;
            require_dir("--genomes", &update.genomes)
        }
        Command::Tabulate(tabulate) => require_dir("--json", &tabulate.json),
    }
}

/// Validate merged settings and build the typing configuration
pub fn validate_settings(settings: &Settings) -> Result<ValidationResult, String> {
    let mut config = settings.typing.clone();

    check_fraction("identity_floor", config.identity_floor)?;
    check_fraction("min_coverage", config.min_coverage)?;

    if let Some(secs) = config.search_timeout_secs {
        if !secs.is_finite() || secs < 0.0 {
            return Err(format!("Search timeout must be a finite non-negative number, got {}", secs));
        }
    }
    if config.threads == Some(0) {
        return Err("Thread count must be at least 1".to_string());
    }

    let delimiter = config.delimiter_byte()?;

    // Custom scores override the preset mode
    if settings.match_score.is_some()
        || settings.mismatch_penalty.is_some()
        || settings.gap_open.is_some()
        || settings.gap_extend.is_some()
    {
        config.alignment = AlignmentConfig::custom(
            settings.match_score.unwrap_or(2),
            settings.mismatch_penalty.unwrap_or(-1),
            settings.gap_open.unwrap_or(5),
            settings.gap_extend.unwrap_or(2),
        );
    } else if let Some(mode) = &settings.alignment_mode {
        config.alignment = AlignmentConfig::from_mode(mode)?;
    }

    let registry = SearchRegistry::new(&config.alignment);
    if !registry.has_adapter(&config.search) {
        return Err(format!(
            "Invalid search adapter '{}'. Available: {}",
            config.search,
            registry.get_adapter_names().join(", ")
        ));
    }

    let loci_include_regex = compile_regex("include_loci", settings.include_loci.as_deref())?;
    let loci_exclude_regex = compile_regex("exclude_loci", settings.exclude_loci.as_deref())?;

    Ok(ValidationResult {
        config,
        delimiter,
        loci_include_regex,
        loci_exclude_regex,
    })
}

/// Validate all command line arguments
pub fn validate_args(args: &Args, settings: &Settings) -> Result<ValidationResult, String> {
    if let Some(command) = &args.command {
        validate_paths(command)?;
    }
    validate_settings(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let result = validate_settings(&Settings::default()).unwrap();
        assert_eq!(result.delimiter, b'\t');
        assert_eq!(result.config.alignment, AlignmentConfig::default());
        assert!(result.loci_include_regex.is_none());
    }

    #[test]
    fn test_fraction_ranges() {
        let mut settings = Settings::default();
        settings.typing.identity_floor = 0.0;
        assert!(validate_settings(&settings).is_err());

        settings.typing.identity_floor = 1.0;
        settings.typing.min_coverage = 1.5;
        assert!(validate_settings(&settings)
            .err()
            .unwrap()
            .contains("min_coverage"));
    }

    #[test]
    fn test_timeout_must_be_finite() {
        let mut settings = Settings::default();
        settings.typing.search_timeout_secs = Some(f64::INFINITY);
        assert!(validate_settings(&settings).err().unwrap().contains("finite"));

        settings.typing.search_timeout_secs = Some(-1.0);
        assert!(validate_settings(&settings).is_err());

        settings.typing.search_timeout_secs = Some(2.5);
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_rejects_bad_delimiter_adapter_and_regex() {
        let mut settings = Settings::default();
        settings.typing.delimiter = "||".to_string();
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.typing.search = "blast".to_string();
        let err = validate_settings(&settings).err().unwrap();
        assert!(err.contains("exact") && err.contains("parasail"));

        let settings = Settings {
            include_loci: Some("(".to_string()),
            ..Settings::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_custom_scores_override_mode() {
        let settings = Settings {
            alignment_mode: Some("dna-strict".to_string()),
            match_score: Some(3),
            ..Settings::default()
        };
        let result = validate_settings(&settings).unwrap();
        assert_eq!(result.config.alignment, AlignmentConfig::custom(3, -1, 5, 2));

        let settings = Settings {
            alignment_mode: Some("protein".to_string()),
            ..Settings::default()
        };
        assert!(validate_settings(&settings).is_err());
    }
}
