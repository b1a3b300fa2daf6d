// parasail.rs - Local alignment search backed by parasail

use super::traits::{check_deadline, Alignment, SearchAdapter, SearchError, Strand};
use crate::core::alignment::{compute_traceback_stats, reverse_complement, AlignmentConfig};
use crate::data::genome::Contig;
use parasail_rs::{Aligner, Matrix};
use std::time::Instant;

const ALPHABET: &[u8] = b"ACGTN";

/// Extra contig bases kept on each side of the scan hit before traceback
const WINDOW_PADDING: usize = 32;

/// Smith-Waterman search of an allele against every contig on both strands.
///
/// A score-only pass locates the best hit per contig and strand; the traced
/// pass then runs on a window around that hit so the traceback table stays
/// proportional to the allele length rather than the contig length.
#[derive(Debug, Clone)]
pub struct ParasailSearch {
    config: AlignmentConfig,
}

impl ParasailSearch {
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    fn matrix(&self) -> Result<Matrix, SearchError> {
        Matrix::create(ALPHABET, self.config.match_score, self.config.mismatch_penalty)
            .map_err(|_| SearchError::Failed("could not build the scoring matrix".to_string()))
    }
}

impl Default for ParasailSearch {
    fn default() -> Self {
        Self::new(AlignmentConfig::default())
    }
}

impl SearchAdapter for ParasailSearch {
    fn search(
        &self,
        query: &[u8],
        contigs: &[Contig],
        deadline: Option<Instant>,
    ) -> Result<Vec<Alignment>, SearchError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let scan_aligner = Aligner::new()
            .matrix(self.matrix()?)
            .gap_open(self.config.gap_open)
            .gap_extend(self.config.gap_extend)
            .local()
            .build();

        let trace_aligner = Aligner::new()
            .matrix(self.matrix()?)
            .gap_open(self.config.gap_open)
            .gap_extend(self.config.gap_extend)
            .local()
            .use_trace()
            .build();

        let query_rc = reverse_complement(query);
        let allele_len = query.len();
        let mut hits = Vec::new();

        for contig in contigs {
            if contig.is_empty() {
                continue;
            }
            for (strand, oriented) in [(Strand::Forward, query), (Strand::Reverse, &query_rc[..])] {
                check_deadline(deadline)?;

                let scan = scan_aligner
                    .align(Some(oriented), &contig.sequence)
                    .map_err(|_| SearchError::Failed(format!("alignment against {} failed", contig.id)))?;
                if scan.get_score() <= 0 {
                    continue;
                }

                let scan_end = scan.get_end_ref() as usize + 1;
                let window_start = scan_end.saturating_sub(2 * allele_len + WINDOW_PADDING);
                let window_end = (scan_end + WINDOW_PADDING).min(contig.len());
                let window = &contig.sequence[window_start..window_end];

                let traced = trace_aligner
                    .align(Some(oriented), window)
                    .map_err(|_| SearchError::Failed(format!("traceback against {} failed", contig.id)))?;
                let traceback = traced
                    .get_traceback_strings(oriented, window)
                    .map_err(|_| SearchError::Failed(format!("traceback against {} failed", contig.id)))?;

                let stats = compute_traceback_stats(&traceback.query, &traceback.reference);
                if stats.columns == 0 || stats.matches == 0 {
                    continue;
                }

                let oriented_end = traced.get_end_query() as usize + 1;
                let oriented_start = oriented_end.saturating_sub(stats.query_bases);
                let subject_end = window_start + traced.get_end_ref() as usize + 1;
                let subject_start = subject_end.saturating_sub(stats.reference_bases);

                let (query_start, query_end) = match strand {
                    Strand::Forward => (oriented_start, oriented_end),
                    Strand::Reverse => (allele_len - oriented_end, allele_len - oriented_start),
                };

                hits.push(Alignment {
                    contig: contig.id.clone(),
                    strand,
                    query_start,
                    query_end,
                    subject_start,
                    subject_end,
                    matches: stats.matches,
                    length: stats.columns,
                    score: traced.get_score(),
                });
            }
        }

        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| b.cmp_identity(a)));
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "parasail"
    }

    fn description(&self) -> &'static str {
        "Smith-Waterman local alignment (parasail) on both strands"
    }
}
