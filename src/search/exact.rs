// exact.rs - Ungapped exact-match search on both strands

use super::traits::{check_deadline, Alignment, SearchAdapter, SearchError, Strand};
use crate::core::alignment::reverse_complement;
use crate::data::genome::Contig;
use std::time::Instant;

/// Reports every verbatim occurrence of the query or its reverse complement.
///
/// Only full-length identical hits are found, so calls made with this
/// adapter are either exact or absent.
#[derive(Debug, Clone, Default)]
pub struct ExactSearch;

fn occurrences(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(pos, _)| pos)
        .collect()
}

impl SearchAdapter for ExactSearch {
    fn search(
        &self,
        query: &[u8],
        contigs: &[Contig],
        deadline: Option<Instant>,
    ) -> Result<Vec<Alignment>, SearchError> {
        let query_rc = reverse_complement(query);
        let palindromic = query_rc == query;
        let mut strands: Vec<(Strand, &[u8])> = vec![(Strand::Forward, query)];
        if !palindromic {
            strands.push((Strand::Reverse, &query_rc));
        }
        let mut hits = Vec::new();

        for contig in contigs {
            check_deadline(deadline)?;
            for &(strand, needle) in &strands {
                for start in occurrences(&contig.sequence, needle) {
                    hits.push(Alignment {
                        contig: contig.id.clone(),
                        strand,
                        query_start: 0,
                        query_end: query.len(),
                        subject_start: start,
                        subject_end: start + query.len(),
                        matches: query.len(),
                        length: query.len(),
                        score: query.len() as i32,
                    });
                }
            }
        }

        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "exact"
    }

    fn description(&self) -> &'static str {
        "Ungapped exact matching on both strands (exact or absent calls only)"
    }
}
