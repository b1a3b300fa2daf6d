// traits.rs - Search capability used by the calling and update engines

use crate::data::genome::Contig;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::time::Instant;
use thiserror::Error;

/// Contig strand an allele was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Reverse,
}

impl Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// One local alignment of a query allele against a contig.
///
/// Query coordinates are in allele orientation; subject coordinates are on
/// the forward strand of the contig. All intervals are 0-based, half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub contig: String,
    pub strand: Strand,
    pub query_start: usize,
    pub query_end: usize,
    pub subject_start: usize,
    pub subject_end: usize,
    /// Identical columns
    pub matches: usize,
    /// Alignment columns including gaps
    pub length: usize,
    pub score: i32,
}

impl Alignment {
    pub fn identity(&self) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            self.matches as f64 / self.length as f64
        }
    }

    /// Allele bases covered by the alignment
    pub fn query_span(&self) -> usize {
        self.query_end - self.query_start
    }

    /// Compare identities exactly as `matches / length` fractions
    pub fn cmp_identity(&self, other: &Alignment) -> std::cmp::Ordering {
        let lhs = self.matches as u128 * other.length.max(1) as u128;
        let rhs = other.matches as u128 * self.length.max(1) as u128;
        lhs.cmp(&rhs)
    }
}

/// Failures of the search primitive
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    #[error("search failed: {0}")]
    Failed(String),
    #[error("search deadline exceeded")]
    TimedOut,
}

/// Check a caller-supplied deadline
pub fn check_deadline(deadline: Option<Instant>) -> Result<(), SearchError> {
    match deadline {
        Some(limit) if Instant::now() >= limit => Err(SearchError::TimedOut),
        _ => Ok(()),
    }
}

/// Pluggable sequence search.
///
/// Given one query and a contig set, return candidate alignments ranked best
/// first. Implementations must honour `deadline` between units of work.
pub trait SearchAdapter: Send + Sync + Debug {
    fn search(
        &self,
        query: &[u8],
        contigs: &[Contig],
        deadline: Option<Instant>,
    ) -> Result<Vec<Alignment>, SearchError>;

    /// Search several queries; the default runs them one at a time
    fn search_many(
        &self,
        queries: &[(u32, &[u8])],
        contigs: &[Contig],
        deadline: Option<Instant>,
    ) -> Result<Vec<(u32, Alignment)>, SearchError> {
        let mut hits = Vec::new();
        for (id, query) in queries {
            check_deadline(deadline)?;
            hits.extend(
                self.search(query, contigs, deadline)?
                    .into_iter()
                    .map(|alignment| (*id, alignment)),
            );
        }
        Ok(hits)
    }

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;
    use std::time::Duration;

    fn alignment(matches: usize, length: usize) -> Alignment {
        Alignment {
            contig: "c".to_string(),
            strand: Strand::Forward,
            query_start: 0,
            query_end: length,
            subject_start: 0,
            subject_end: length,
            matches,
            length,
            score: 0,
        }
    }

    #[test]
    fn test_identity_comparison() {
        assert_eq!(alignment(9, 10).cmp_identity(&alignment(90, 100)), Ordering::Equal);
        assert_eq!(alignment(10, 10).cmp_identity(&alignment(9, 10)), Ordering::Greater);
        assert!((alignment(9, 10).identity() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_deadline() {
        assert!(check_deadline(None).is_ok());
        assert!(check_deadline(Some(Instant::now() + Duration::from_secs(60))).is_ok());
        let past = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(check_deadline(Some(past)), Err(SearchError::TimedOut));
    }

    #[test]
    fn test_strand_serde() {
        assert_eq!(serde_json::to_string(&Strand::Reverse).unwrap(), "\"-\"");
        assert_eq!(Strand::Forward.to_string(), "+");
    }
}
