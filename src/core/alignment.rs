// alignment.rs - Alignment scoring configuration and sequence utilities

use serde::{Deserialize, Serialize};

/// Scoring parameters for the local aligner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    pub description: Option<String>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            match_score: 2,
            mismatch_penalty: -1,
            gap_open: 5,
            gap_extend: 2,
            description: Some("Default DNA alignment parameters".to_string()),
        }
    }
}

impl AlignmentConfig {
    /// Create configuration from mode string
    pub fn from_mode(mode: &str) -> Result<Self, String> {
        match mode {
            "dna" => Ok(Self {
                match_score: 2,
                mismatch_penalty: -1,
                gap_open: 5,
                gap_extend: 2,
                description: Some("Standard DNA alignment".to_string()),
            }),
            "dna-strict" => Ok(Self {
                match_score: 3,
                mismatch_penalty: -2,
                gap_open: 8,
                gap_extend: 3,
                description: Some("Strict DNA alignment (higher penalties)".to_string()),
            }),
            "dna-permissive" => Ok(Self {
                match_score: 1,
                mismatch_penalty: 0,
                gap_open: 3,
                gap_extend: 1,
                description: Some("Permissive DNA alignment (lower penalties)".to_string()),
            }),
            _ => Err(format!(
                "Unknown alignment mode: {}. Use: dna, dna-strict, dna-permissive",
                mode
            )),
        }
    }

    /// Create custom configuration
    pub fn custom(match_score: i32, mismatch_penalty: i32, gap_open: i32, gap_extend: i32) -> Self {
        Self {
            match_score,
            mismatch_penalty,
            gap_open,
            gap_extend,
            description: Some("Custom alignment parameters".to_string()),
        }
    }
}

/// Column statistics of a gapped pairwise alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TracebackStats {
    /// Identical, non-gap columns
    pub matches: usize,
    /// All alignment columns, gaps included
    pub columns: usize,
    /// Non-gap symbols of the query row
    pub query_bases: usize,
    /// Non-gap symbols of the reference row
    pub reference_bases: usize,
}

/// Compute column statistics from the two aligned rows of a traceback
pub fn compute_traceback_stats(query: &str, reference: &str) -> TracebackStats {
    let query_bytes = query.as_bytes();
    let ref_bytes = reference.as_bytes();
    let mut stats = TracebackStats::default();

    for (&q, &r) in query_bytes.iter().zip(ref_bytes.iter()) {
        stats.columns += 1;
        if q != b'-' {
            stats.query_bases += 1;
        }
        if r != b'-' {
            stats.reference_bases += 1;
        }
        if q != b'-' && r != b'-' && q.eq_ignore_ascii_case(&r) {
            stats.matches += 1;
        }
    }

    stats
}

/// Compute Hamming distance between two sequences
/// Counts all mismatches, treating length difference as mismatches
pub fn compute_hamming_distance(seq1: &[u8], seq2: &[u8]) -> usize {
    let min_len = seq1.len().min(seq2.len());
    let max_len = seq1.len().max(seq2.len());

    let mismatches = seq1
        .iter()
        .take(min_len)
        .zip(seq2.iter().take(min_len))
        .filter(|(a, b)| a != b)
        .count();

    mismatches + (max_len - min_len)
}

/// Ungapped identity of two sequences over the longer length
pub fn ungapped_identity(seq1: &[u8], seq2: &[u8]) -> f64 {
    let max_len = seq1.len().max(seq2.len());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - compute_hamming_distance(seq1, seq2) as f64 / max_len as f64
}

/// Reverse complement of a nucleotide sequence; unknown symbols become N
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base {
            b'A' | b'a' => b'T',
            b'C' | b'c' => b'G',
            b'G' | b'g' => b'C',
            b'T' | b't' => b'A',
            _ => b'N',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_presets() {
        assert_eq!(AlignmentConfig::from_mode("dna").unwrap().match_score, 2);
        assert_eq!(AlignmentConfig::from_mode("dna-strict").unwrap().gap_open, 8);
        assert!(AlignmentConfig::from_mode("protein").is_err());
    }

    #[test]
    fn test_traceback_stats() {
        let stats = compute_traceback_stats("ACG-TA", "ACGGTT");
        assert_eq!(stats.columns, 6);
        assert_eq!(stats.matches, 4);
        assert_eq!(stats.query_bases, 5);
        assert_eq!(stats.reference_bases, 6);
    }

    #[test]
    fn test_hamming_and_identity() {
        assert_eq!(compute_hamming_distance(b"ACGT", b"ACGA"), 1);
        assert_eq!(compute_hamming_distance(b"ACGT", b"AC"), 2);
        assert!((ungapped_identity(b"ACGTACGTAC", b"ACGTACGTAA") - 0.9).abs() < 1e-9);
        assert_eq!(ungapped_identity(b"", b""), 0.0);
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"AACGTN"), b"NACGTT".to_vec());
        assert_eq!(reverse_complement(b"acgt"), b"ACGT".to_vec());
    }
}
