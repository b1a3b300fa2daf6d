// caller.rs - Allele-calling engine: genome x locus -> call

use crate::core::alignment::reverse_complement;
use crate::core::options::CallOptions;
use crate::data::{AlleleDatabase, Call, CallRecord, Genome, Locus};
use crate::error::{Result, TypingError};
use crate::output::BatchSummary;
use crate::search::{Alignment, SearchAdapter, SearchError, Strand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Maps genomes to per-locus calls using a pluggable search adapter
#[derive(Debug, Clone)]
pub struct CallingEngine {
    search: Arc<dyn SearchAdapter>,
    options: CallOptions,
}

/// Ranking of qualifying hits: identity, then alignment length, then lowest
/// allele id. Remaining ties fall back to genomic position.
fn rank(a: &(u32, Alignment), b: &(u32, Alignment)) -> Ordering {
    let (id_a, hit_a) = a;
    let (id_b, hit_b) = b;
    hit_a
        .cmp_identity(hit_b)
        .then_with(|| hit_a.length.cmp(&hit_b.length))
        .then_with(|| id_b.cmp(id_a))
        .then_with(|| hit_b.contig.cmp(&hit_a.contig))
        .then_with(|| hit_b.subject_start.cmp(&hit_a.subject_start))
        .then_with(|| hit_b.strand.cmp(&hit_a.strand))
}

impl CallingEngine {
    pub fn new(search: Arc<dyn SearchAdapter>, options: CallOptions) -> Self {
        Self { search, options }
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    fn search_error(&self, locus: &str, error: SearchError) -> TypingError {
        match error {
            SearchError::Failed(message) => TypingError::Search {
                locus: locus.to_string(),
                message,
            },
            SearchError::TimedOut => TypingError::Timeout {
                locus: locus.to_string(),
                seconds: self.options.timeout.map(|t| t.as_secs_f64()).unwrap_or(0.0),
            },
        }
    }

    fn qualifies(&self, hit: &Alignment, allele_len: usize) -> bool {
        if hit.length == 0 || allele_len == 0 || hit.query_end > allele_len {
            return false;
        }
        let identity_ok = hit.matches as f64 >= self.options.identity_floor * hit.length as f64 - 1e-9;
        let coverage = hit.query_span() as f64 / allele_len as f64;
        identity_ok && coverage >= self.options.min_coverage - 1e-9
    }

    /// Decide the call for one locus in one genome
    pub fn call(&self, genome: &Genome, locus: &Locus) -> Result<Call> {
        if locus.is_empty() {
            return Err(TypingError::Configuration(format!(
                "Locus '{}' has no reference alleles",
                locus.name
            )));
        }
        if genome.contigs.is_empty() {
            return Err(TypingError::Input(format!("Genome '{}' has no contigs", genome.name)));
        }

        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        let queries: Vec<(u32, &[u8])> = locus.iter().collect();
        let hits = self
            .search
            .search_many(&queries, &genome.contigs, deadline)
            .map_err(|e| self.search_error(&locus.name, e))?;

        let best = hits
            .into_iter()
            .filter(|(id, hit)| {
                locus
                    .get(*id)
                    .map(|allele| self.qualifies(hit, allele.len()))
                    .unwrap_or(false)
            })
            .max_by(rank);

        let Some((allele_id, hit)) = best else {
            debug!("{} / {}: absent", genome.name, locus.name);
            return Ok(Call::Absent);
        };

        let allele_len = locus.get(allele_id).map(<[u8]>::len).unwrap_or(0);
        let contig = genome.contig(&hit.contig).ok_or_else(|| TypingError::Search {
            locus: locus.name.clone(),
            message: format!("search reported unknown contig '{}'", hit.contig),
        })?;
        if hit.subject_end > contig.len() || hit.subject_start > hit.subject_end {
            return Err(TypingError::Search {
                locus: locus.name.clone(),
                message: format!(
                    "search reported out-of-range span {}..{} on '{}'",
                    hit.subject_start, hit.subject_end, hit.contig
                ),
            });
        }

        if hit.query_span() < allele_len {
            let shortfall = allele_len - hit.query_span();
            debug!(
                "{} / {}: partial hit on allele {} ({} bases short)",
                genome.name, locus.name, allele_id, shortfall
            );
            return Ok(Call::Partial {
                best_allele_id: allele_id,
                contig: hit.contig.clone(),
                start: hit.subject_start,
                end: hit.subject_end,
                shortfall,
                strand: hit.strand,
                query_start: hit.query_start,
                query_end: hit.query_end,
                allele_length: allele_len,
                contig_edge: hit.subject_start == 0 || hit.subject_end == contig.len(),
            });
        }

        let span = &contig.sequence[hit.subject_start..hit.subject_end];
        let observed = match hit.strand {
            Strand::Forward => span.to_vec(),
            Strand::Reverse => reverse_complement(span),
        };

        match locus.id_of(&observed) {
            Some(id) => {
                debug!("{} / {}: exact allele {}", genome.name, locus.name, id);
                Ok(Call::Exact { allele_id: id })
            }
            None => {
                debug!(
                    "{} / {}: new allele (closest {}, identity {:.4})",
                    genome.name,
                    locus.name,
                    allele_id,
                    hit.identity()
                );
                Ok(Call::New {
                    sequence: String::from_utf8_lossy(&observed).into_owned(),
                    contig: hit.contig.clone(),
                    start: hit.subject_start,
                    end: hit.subject_end,
                    strand: hit.strand,
                    best_allele_id: allele_id,
                    identity: hit.identity(),
                })
            }
        }
    }

    /// Call every requested locus of one genome in parallel.
    ///
    /// A failing locus is recorded in `failures` and does not affect the
    /// other loci.
    pub fn call_genome(&self, genome: &Genome, db: &AlleleDatabase, loci: &[String]) -> CallRecord {
        let outcomes: Vec<(String, Result<Call>)> = loci
            .par_iter()
            .map(|name| {
                let outcome = db.read(name).and_then(|locus| self.call(genome, &locus));
                (name.clone(), outcome)
            })
            .collect();

        let mut record = CallRecord::new(genome.name.clone());
        for (locus, outcome) in outcomes {
            match outcome {
                Ok(call) => record.insert_call(locus, call),
                Err(e) => {
                    warn!("{} / {}: {} ({})", genome.name, locus, e, e.kind());
                    record.insert_failure(locus, format!("{}: {}", e.kind(), e));
                }
            }
        }
        debug!(
            "{}: {} contigs, {} bp, calls {:?}, {} failed",
            genome.name,
            genome.contigs.len(),
            genome.total_length(),
            record.count_by_label(),
            record.failures.len()
        );
        record
    }

    /// Load and call many genome files in parallel.
    ///
    /// Genome-level input errors are isolated per genome. Results keep the
    /// order of `genome_paths`.
    pub fn call_batch(
        &self,
        genome_paths: &[PathBuf],
        db: &AlleleDatabase,
        loci: &[String],
    ) -> (Vec<(PathBuf, Result<CallRecord>)>, BatchSummary) {
        info!(
            "Calling {} loci in {} genomes with '{}' search",
            loci.len(),
            genome_paths.len(),
            self.search.name()
        );

        let pb = ProgressBar::new(genome_paths.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} genomes ({percent}%) ETA: {eta}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let results: Vec<(PathBuf, Result<CallRecord>)> = genome_paths
            .par_iter()
            .map(|path| {
                let outcome = Genome::from_fasta(path).map(|genome| self.call_genome(&genome, db, loci));
                pb.inc(1);
                (path.clone(), outcome)
            })
            .collect();
        pb.finish_and_clear();

        let mut summary = BatchSummary::new("call");
        for (path, outcome) in &results {
            let item = path.display().to_string();
            match outcome {
                Ok(record) if record.failures.is_empty() => summary.succeed(),
                Ok(record) => summary.fail(
                    item,
                    format!("{} of {} loci failed", record.failures.len(), loci.len()),
                ),
                Err(e) => {
                    warn!("Skipping genome {}: {}", item, e);
                    summary.fail(item, e.to_string());
                }
            }
        }
        info!("{}", summary);
        (results, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Contig;
    use crate::search::{ExactSearch, ParasailSearch};
    use std::sync::Mutex;

    /// Scripted adapter returning fixed hits per query sequence
    #[derive(Debug, Default)]
    struct ScriptedSearch {
        hits: Vec<(Vec<u8>, Alignment)>,
        fail: Option<SearchError>,
        calls: Mutex<usize>,
    }

    impl SearchAdapter for ScriptedSearch {
        fn search(
            &self,
            query: &[u8],
            _contigs: &[Contig],
            _deadline: Option<Instant>,
        ) -> std::result::Result<Vec<Alignment>, SearchError> {
            *self.calls.lock().unwrap() += 1;
            if let Some(err) = &self.fail {
                return Err(err.clone());
            }
            Ok(self
                .hits
                .iter()
                .filter(|(q, _)| q.as_slice() == query)
                .map(|(_, hit)| hit.clone())
                .collect())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn description(&self) -> &'static str {
            "test double"
        }
    }

    fn hit(contig: &str, q: (usize, usize), s: (usize, usize), matches: usize, length: usize) -> Alignment {
        Alignment {
            contig: contig.to_string(),
            strand: Strand::Forward,
            query_start: q.0,
            query_end: q.1,
            subject_start: s.0,
            subject_end: s.1,
            matches,
            length,
            score: matches as i32,
        }
    }

    fn abc_locus() -> Locus {
        Locus::from_alleles("abc", vec![(1, "ACGTACGT"), (2, "ACGTACGG")]).unwrap()
    }

    fn engine(search: impl SearchAdapter + 'static) -> CallingEngine {
        CallingEngine::new(Arc::new(search), CallOptions::default())
    }

    #[test]
    fn test_exact_copy_is_exact_call() {
        let genome = Genome::new("g1", vec![Contig::new("c1", "TTTTACGTACGTTTTT")]).unwrap();
        let call = engine(ExactSearch).call(&genome, &abc_locus()).unwrap();
        assert_eq!(call, Call::Exact { allele_id: 1 });
    }

    #[test]
    fn test_no_hit_is_absent() {
        let genome = Genome::new("g3", vec![Contig::new("c1", "TTTTTTTTTTTTTTTT")]).unwrap();
        let call = engine(ExactSearch).call(&genome, &abc_locus()).unwrap();
        assert_eq!(call, Call::Absent);
    }

    #[test]
    fn test_truncated_hit_is_partial() {
        // ACGTAC sits at the very end of the contig
        let genome = Genome::new("g2", vec![Contig::new("c1", "TTTTTTACGTAC")]).unwrap();
        let search = ScriptedSearch {
            hits: vec![(b"ACGTACGT".to_vec(), hit("c1", (0, 6), (6, 12), 6, 6))],
            ..Default::default()
        };
        let call = engine(search).call(&genome, &abc_locus()).unwrap();
        match call {
            Call::Partial {
                best_allele_id,
                shortfall,
                contig_edge,
                start,
                end,
                ..
            } => {
                assert_eq!(best_allele_id, 1);
                assert_eq!(shortfall, 2);
                assert!(contig_edge);
                assert_eq!((start, end), (6, 12));
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_full_length_mismatch_is_new() {
        let genome = Genome::new("g4", vec![Contig::new("c1", "GGACGTACCTGG")]).unwrap();
        let search = ScriptedSearch {
            hits: vec![(b"ACGTACGT".to_vec(), hit("c1", (0, 8), (2, 10), 7, 8))],
            ..Default::default()
        };
        let options = CallOptions {
            identity_floor: 0.85,
            ..CallOptions::default()
        };
        let call = CallingEngine::new(Arc::new(search), options)
            .call(&genome, &abc_locus())
            .unwrap();
        match call {
            Call::New {
                sequence,
                best_allele_id,
                start,
                end,
                ..
            } => {
                assert_eq!(sequence, "ACGTACCT");
                assert_eq!(best_allele_id, 1);
                assert_eq!((start, end), (2, 10));
            }
            other => panic!("expected new, got {:?}", other),
        }
    }

    #[test]
    fn test_hits_below_identity_floor_are_absent() {
        let genome = Genome::new("g5", vec![Contig::new("c1", "GGACGTACCTGG")]).unwrap();
        let search = ScriptedSearch {
            hits: vec![(b"ACGTACGT".to_vec(), hit("c1", (0, 8), (2, 10), 7, 8))],
            ..Default::default()
        };
        // 7/8 = 0.875 < 0.90 default floor
        let call = engine(search).call(&genome, &abc_locus()).unwrap();
        assert_eq!(call, Call::Absent);
    }

    #[test]
    fn test_tie_break_prefers_lowest_allele_id() {
        let locus = Locus::from_alleles("abc", vec![(3, "AAAACCCC"), (2, "AAAACCCG")]).unwrap();
        let genome = Genome::new("g6", vec![Contig::new("c1", "AAAACCCCAAAACCCG")]).unwrap();
        // equal identity and length for both alleles; the scripted hits point
        // at allele-specific spans so the winner is observable
        let search = ScriptedSearch {
            hits: vec![
                (b"AAAACCCC".to_vec(), hit("c1", (0, 8), (0, 8), 8, 8)),
                (b"AAAACCCG".to_vec(), hit("c1", (0, 8), (8, 16), 8, 8)),
            ],
            ..Default::default()
        };
        let call = engine(search).call(&genome, &locus).unwrap();
        assert_eq!(call, Call::Exact { allele_id: 2 });
    }

    #[test]
    fn test_identity_beats_length() {
        let genome = Genome::new("g7", vec![Contig::new("c1", "ACGTACGTTTTTACGTAC")]).unwrap();
        let search = ScriptedSearch {
            hits: vec![
                // full-length but 1 mismatch on allele 2
                (b"ACGTACGG".to_vec(), hit("c1", (0, 8), (0, 8), 7, 8)),
                // shorter perfect hit on allele 1
                (b"ACGTACGT".to_vec(), hit("c1", (0, 6), (12, 18), 6, 6)),
            ],
            ..Default::default()
        };
        let options = CallOptions {
            identity_floor: 0.8,
            ..CallOptions::default()
        };
        let call = CallingEngine::new(Arc::new(search), options)
            .call(&genome, &abc_locus())
            .unwrap();
        assert!(call.is_partial());
    }

    #[test]
    fn test_search_failure_is_surfaced() {
        let genome = Genome::new("g8", vec![Contig::new("c1", "ACGT")]).unwrap();
        let search = ScriptedSearch {
            fail: Some(SearchError::TimedOut),
            ..Default::default()
        };
        let err = engine(search).call(&genome, &abc_locus()).unwrap_err();
        assert_eq!(err.kind(), "SearchError");

        let search = ScriptedSearch {
            fail: Some(SearchError::Failed("boom".to_string())),
            ..Default::default()
        };
        let err = engine(search).call(&genome, &abc_locus()).unwrap_err();
        assert!(matches!(err, TypingError::Search { .. }));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let genome = Genome::new("g9", vec![Contig::new("c1", "ACGT")]).unwrap();
        let err = engine(ExactSearch).call(&genome, &Locus::new("empty")).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");

        let hollow = Genome {
            name: "hollow".to_string(),
            contigs: Vec::new(),
        };
        let err = engine(ExactSearch).call(&hollow, &abc_locus()).unwrap_err();
        assert_eq!(err.kind(), "InputError");
    }

    #[test]
    fn test_call_is_deterministic() {
        let allele = "ATGGCTAGCTTACGGATCCAGTCGATCGGA";
        let locus = Locus::from_alleles("abc", vec![(1, allele)]).unwrap();
        let genome = Genome::new(
            "g10",
            vec![Contig::new("c1", format!("TTTTT{}TTTTT", allele)), Contig::new("c2", allele)],
        )
        .unwrap();
        let engine = engine(ParasailSearch::default());
        let first = engine.call(&genome, &locus).unwrap();
        let second = engine.call(&genome, &locus).unwrap();
        assert_eq!(first, Call::Exact { allele_id: 1 });
        assert_eq!(first, second);
    }

    #[test]
    fn test_call_genome_isolates_failures() {
        let mut db = AlleleDatabase::new();
        db.insert_locus(abc_locus()).unwrap();
        db.insert_locus(Locus::from_alleles("xyz", vec![(3, "GGGGCCCC")]).unwrap())
            .unwrap();
        let genome = Genome::new("g1", vec![Contig::new("c1", "TTACGTACGTTTGGGGCCCC")]).unwrap();

        let loci = vec!["abc".to_string(), "missing".to_string(), "xyz".to_string()];
        let record = engine(ExactSearch).call_genome(&genome, &db, &loci);
        assert_eq!(record.calls["abc"], Call::Exact { allele_id: 1 });
        assert_eq!(record.calls["xyz"], Call::Exact { allele_id: 3 });
        assert!(record.failures["missing"].starts_with("ConfigurationError"));
    }

    #[test]
    fn test_call_batch_isolates_bad_genomes() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.fasta");
        let bad = dir.path().join("bad.fasta");
        std::fs::write(&good, ">c1\nTTACGTACGTTT\n").unwrap();
        std::fs::write(&bad, "").unwrap();

        let mut db = AlleleDatabase::new();
        db.insert_locus(abc_locus()).unwrap();
        let (results, summary) =
            engine(ExactSearch).call_batch(&[good.clone(), bad.clone()], &db, &["abc".to_string()]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, good);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }
}
