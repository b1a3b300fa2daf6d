// error.rs - Error taxonomy for calling, updating and tabulating

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the typing core.
///
/// Each variant belongs to one failure class; `kind()` gives the class label
/// used in batch summaries.
#[derive(Debug, Error)]
pub enum TypingError {
    /// Invalid or empty locus / allele set. Fatal for the run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or empty genome. Fatal for that genome only.
    #[error("Input error: {0}")]
    Input(String),

    /// The search primitive failed for one (genome, locus) pair.
    #[error("Search failed for locus '{locus}': {message}")]
    Search { locus: String, message: String },

    /// The search primitive exceeded the caller-supplied timeout.
    #[error("Search timed out for locus '{locus}' after {seconds:.1}s")]
    Timeout { locus: String, seconds: f64 },

    /// An update referenced a genome that was not supplied.
    #[error("Genome '{0}' referenced by a call record was not found")]
    MissingGenome(String),

    /// Nothing to tabulate.
    #[error("No input: {0}")]
    NoInput(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing or atomically replacing an output file failed.
    #[error("Failed to persist {}: {message}", path.display())]
    Persist { path: PathBuf, message: String },
}

impl TypingError {
    /// Failure class label
    pub fn kind(&self) -> &'static str {
        match self {
            TypingError::Configuration(_) => "ConfigurationError",
            TypingError::Input(_) => "InputError",
            TypingError::Search { .. } | TypingError::Timeout { .. } => "SearchError",
            TypingError::MissingGenome(_) => "MissingGenomeError",
            TypingError::NoInput(_) => "NoInputError",
            TypingError::Io { .. } | TypingError::Json { .. } | TypingError::Persist { .. } => {
                "IoError"
            }
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TypingError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TypingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            TypingError::Configuration("x".into()).kind(),
            "ConfigurationError"
        );
        assert_eq!(TypingError::Input("x".into()).kind(), "InputError");
        assert_eq!(
            TypingError::Timeout {
                locus: "abc".into(),
                seconds: 1.0
            }
            .kind(),
            "SearchError"
        );
        assert_eq!(
            TypingError::MissingGenome("g1".into()).kind(),
            "MissingGenomeError"
        );
        assert_eq!(TypingError::NoInput("x".into()).kind(), "NoInputError");
    }

    #[test]
    fn test_error_messages() {
        let err = TypingError::MissingGenome("g7".to_string());
        assert!(err.to_string().contains("g7"));

        let err = TypingError::Search {
            locus: "abc".to_string(),
            message: "aligner crashed".to_string(),
        };
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("aligner crashed"));
    }
}
