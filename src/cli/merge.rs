// merge.rs - Merge configuration file with CLI arguments

use crate::cli::args::{Args, Command};
use crate::cli::Config;
use crate::core::TypingConfig;

/// Settings before validation: defaults, then config file, then CLI flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub typing: TypingConfig,
    pub alignment_mode: Option<String>,
    pub match_score: Option<i32>,
    pub mismatch_penalty: Option<i32>,
    pub gap_open: Option<i32>,
    pub gap_extend: Option<i32>,
    pub include_loci: Option<String>,
    pub exclude_loci: Option<String>,
}

/// Accept the spellings people type for a tab on the command line
pub fn normalize_delimiter(delimiter: &str) -> String {
    match delimiter {
        "\\t" | "tab" | "TAB" => "\t".to_string(),
        other => other.to_string(),
    }
}

impl Config {
    /// Overlay the values set in this file on `settings`
    pub fn apply(self, mut settings: Settings) -> Settings {
        let typing = &mut settings.typing;
        if let Some(value) = self.identity_floor {
            typing.identity_floor = value;
        }
        if let Some(value) = self.min_coverage {
            typing.min_coverage = value;
        }
        if let Some(value) = self.search {
            typing.search = value;
        }
        if self.search_timeout_secs.is_some() {
            typing.search_timeout_secs = self.search_timeout_secs;
        }
        if let Some(value) = self.extension_threshold {
            typing.extension_threshold = value;
        }
        if let Some(value) = self.auto_append_novel {
            typing.auto_append_novel = value;
        }
        if let Some(value) = self.delimiter {
            typing.delimiter = normalize_delimiter(&value);
        }
        if let Some(value) = self.sentinels {
            typing.sentinels = value;
        }
        if self.threads.is_some() {
            typing.threads = self.threads;
        }

        settings.alignment_mode = self.alignment_mode.or(settings.alignment_mode);
        settings.match_score = self.match_score.or(settings.match_score);
        settings.mismatch_penalty = self.mismatch_penalty.or(settings.mismatch_penalty);
        settings.gap_open = self.gap_open.or(settings.gap_open);
        settings.gap_extend = self.gap_extend.or(settings.gap_extend);
        settings.include_loci = self.include_loci.or(settings.include_loci);
        settings.exclude_loci = self.exclude_loci.or(settings.exclude_loci);
        settings
    }
}

impl Args {
    /// Merge with configuration from file
    /// CLI arguments take precedence over config file values
    pub fn merge_with_config(&self, config: Config) -> Settings {
        let mut settings = config.apply(Settings::default());
        let typing = &mut settings.typing;

        if self.threads.is_some() {
            typing.threads = self.threads;
        }

        match &self.command {
            Some(Command::Call(call)) => {
                if let Some(value) = call.identity_floor {
                    typing.identity_floor = value;
                }
                if let Some(value) = call.min_coverage {
                    typing.min_coverage = value;
                }
                if let Some(value) = &call.search {
                    typing.search = value.clone();
                }
                if call.timeout.is_some() {
                    typing.search_timeout_secs = call.timeout;
                }
                if call.alignment_mode.is_some() {
                    settings.alignment_mode = call.alignment_mode.clone();
                }
                if call.include_loci.is_some() {
                    settings.include_loci = call.include_loci.clone();
                }
                if call.exclude_loci.is_some() {
                    settings.exclude_loci = call.exclude_loci.clone();
                }
            }
            Some(Command::Update(update)) => {
                if let Some(value) = update.threshold {
                    typing.extension_threshold = value;
                }
                if let Some(value) = update.identity_floor {
                    typing.identity_floor = value;
                }
                if update.no_append {
                    typing.auto_append_novel = false;
                }
            }
            Some(Command::Tabulate(tabulate)) => {
                if let Some(value) = &tabulate.delimiter {
                    typing.delimiter = normalize_delimiter(value);
                }
                if tabulate.include_loci.is_some() {
                    settings.include_loci = tabulate.include_loci.clone();
                }
                if tabulate.exclude_loci.is_some() {
                    settings.exclude_loci = tabulate.exclude_loci.clone();
                }
            }
            None => {}
        }

        settings
    }

    /// Load the configuration file, if any, and merge with CLI args
    pub fn load_settings(&self) -> Result<Settings, String> {
        let config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::new(),
        };
        Ok(self.merge_with_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argh::FromArgs;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["mlstcall"], args).unwrap()
    }

    #[test]
    fn test_defaults_without_config() {
        let args = parse(&["tabulate", "-j", "json"]);
        let settings = args.merge_with_config(Config::new());
        assert_eq!(settings.typing, TypingConfig::default());
        assert_eq!(settings.include_loci, None);
    }

    #[test]
    fn test_config_overrides_defaults() {
        let args = parse(&["update", "-a", "alleles", "-j", "json", "-g", "genomes"]);
        let config = Config {
            extension_threshold: Some(25),
            auto_append_novel: Some(false),
            ..Config::new()
        };
        let settings = args.merge_with_config(config);
        assert_eq!(settings.typing.extension_threshold, 25);
        assert!(!settings.typing.auto_append_novel);
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = parse(&[
            "--threads",
            "4",
            "call",
            "-i",
            "g.fasta",
            "-a",
            "alleles",
            "--identity-floor",
            "0.95",
            "--search",
            "exact",
            "--exclude-loci",
            "^tmp",
        ]);
        let config = Config {
            identity_floor: Some(0.8),
            min_coverage: Some(0.7),
            search: Some("parasail".to_string()),
            exclude_loci: Some("^old".to_string()),
            threads: Some(16),
            ..Config::new()
        };
        let settings = args.merge_with_config(config);
        assert_eq!(settings.typing.identity_floor, 0.95);
        assert_eq!(settings.typing.min_coverage, 0.7);
        assert_eq!(settings.typing.search, "exact");
        assert_eq!(settings.typing.threads, Some(4));
        assert_eq!(settings.exclude_loci.as_deref(), Some("^tmp"));
    }

    #[test]
    fn test_delimiter_spellings() {
        let args = parse(&["tabulate", "-j", "json", "-d", "\\t"]);
        let config = Config {
            delimiter: Some(",".to_string()),
            ..Config::new()
        };
        assert_eq!(args.merge_with_config(config).typing.delimiter, "\t");
        assert_eq!(normalize_delimiter(";"), ";");
    }
}
