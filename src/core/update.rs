// update.rs - Database-update engine: extend partial hits, number novel alleles

use crate::core::alignment::{reverse_complement, ungapped_identity};
use crate::core::options::UpdateOptions;
use crate::data::genome::index_genome_dir;
use crate::data::record::list_record_files;
use crate::data::{AlleleDatabase, Call, CallRecord, Genome, Locus};
use crate::error::{Result, TypingError};
use crate::output::BatchSummary;
use crate::search::Strand;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Genomes available to an update run
#[derive(Debug, Clone)]
pub enum GenomeSet {
    /// Genomes already in memory, by name
    Loaded(BTreeMap<String, Genome>),
    /// FASTA files loaded on demand, by genome name
    Files(BTreeMap<String, PathBuf>),
}

impl GenomeSet {
    pub fn from_genomes(genomes: impl IntoIterator<Item = Genome>) -> Self {
        GenomeSet::Loaded(
            genomes
                .into_iter()
                .map(|genome| (genome.name.clone(), genome))
                .collect(),
        )
    }

    pub fn from_directory(genome_dir: &Path) -> Result<Self> {
        Ok(GenomeSet::Files(index_genome_dir(genome_dir)?))
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            GenomeSet::Loaded(genomes) => genomes.contains_key(name),
            GenomeSet::Files(paths) => paths.contains_key(name),
        }
    }

    pub fn load(&self, name: &str) -> Result<Cow<'_, Genome>> {
        match self {
            GenomeSet::Loaded(genomes) => genomes
                .get(name)
                .map(Cow::Borrowed)
                .ok_or_else(|| TypingError::MissingGenome(name.to_string())),
            GenomeSet::Files(paths) => {
                let path = paths
                    .get(name)
                    .ok_or_else(|| TypingError::MissingGenome(name.to_string()))?;
                Genome::from_fasta(path).map(Cow::Owned)
            }
        }
    }
}

/// Try to grow a partial call to the full allele length using genome context.
///
/// Returns the revised call, or `None` when the hit cannot be extended to
/// full length within the contig or the extended sequence falls below the
/// identity floor.
pub fn extend_partial(call: &Call, genome: &Genome, locus: &Locus, identity_floor: f64) -> Option<Call> {
    let Call::Partial {
        best_allele_id,
        contig,
        start,
        end,
        shortfall,
        strand,
        query_start,
        query_end,
        ..
    } = call
    else {
        return None;
    };

    let reference = locus.get(*best_allele_id)?;
    let contig_seq = &genome.contig(contig)?.sequence;
    if *query_end > reference.len() || query_start > query_end || start > end {
        return None;
    }

    // Bases missing on the allele's 5' and 3' sides
    let missing_5p = *query_start;
    let missing_3p = reference.len() - *query_end;
    if missing_5p + missing_3p != *shortfall {
        return None;
    }

    let (left, right) = match strand {
        Strand::Forward => (missing_5p, missing_3p),
        Strand::Reverse => (missing_3p, missing_5p),
    };
    let new_start = start.checked_sub(left)?;
    let new_end = end + right;
    if new_end > contig_seq.len() {
        return None;
    }

    let span = &contig_seq[new_start..new_end];
    let observed = match strand {
        Strand::Forward => span.to_vec(),
        Strand::Reverse => reverse_complement(span),
    };
    if observed.len() != reference.len() {
        return None;
    }

    let identity = ungapped_identity(&observed, reference);
    if identity < identity_floor - 1e-9 {
        return None;
    }

    Some(match locus.id_of(&observed) {
        Some(allele_id) => Call::Exact { allele_id },
        None => Call::New {
            sequence: String::from_utf8_lossy(&observed).into_owned(),
            contig: contig.clone(),
            start: new_start,
            end: new_end,
            strand: *strand,
            best_allele_id: *best_allele_id,
            identity,
        },
    })
}

/// Result of an update run
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// Revised records, in input order
    pub records: Vec<CallRecord>,
    pub summary: BatchSummary,
    /// Partial calls promoted to exact or new
    pub extended: usize,
    /// Ids appended per locus
    pub new_alleles: BTreeMap<String, Vec<u32>>,
    /// `(locus, reason)` for novel sequences that could not be appended
    pub append_failures: Vec<(String, String)>,
    /// Loci whose allele files were rewritten
    pub persisted: Vec<String>,
    /// `(locus, reason)` for allele files that could not be rewritten
    pub persist_failures: Vec<(String, String)>,
    /// Calls replaced by a newly assigned id: locus -> `(record index, prior call, id)`
    assigned: BTreeMap<String, Vec<(usize, Call, u32)>>,
}

impl UpdateOutcome {
    /// Fold per-locus persist results into the outcome.
    ///
    /// Records keep an assigned id only if its locus file was written; for a
    /// locus that failed every call numbered in this run goes back to the call
    /// it replaced, so no record names an id missing from disk.
    pub fn record_persist(&mut self, results: Vec<(String, Result<PathBuf>)>) {
        for (locus, result) in results {
            match result {
                Ok(path) => {
                    debug!("Rewrote {}", path.display());
                    self.persisted.push(locus);
                }
                Err(e) => {
                    warn!("Failed to persist locus {}: {}", locus, e);
                    self.revert_locus(&locus);
                    self.summary
                        .fail(format!("{} allele file", locus), format!("{}: {}", e.kind(), e));
                    self.persist_failures.push((locus, e.to_string()));
                }
            }
        }
    }

    fn revert_locus(&mut self, locus: &str) {
        let new_ids = self.new_alleles.remove(locus).unwrap_or_default();
        for (idx, prior, id) in self.assigned.remove(locus).unwrap_or_default() {
            if new_ids.contains(&id) {
                self.records[idx].insert_call(locus.to_string(), prior);
            }
        }
    }
}

/// Per-record state after the extension phase
enum Revision {
    Revised {
        record: CallRecord,
        extended: usize,
        locus_errors: Vec<(String, TypingError)>,
    },
    Unchanged(CallRecord),
    Failed(CallRecord, TypingError),
}

pub struct UpdateEngine {
    options: UpdateOptions,
}

impl UpdateEngine {
    pub fn new(options: UpdateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    /// Whether a call may attempt extension
    pub fn eligible(&self, call: &Call) -> bool {
        matches!(call, Call::Partial { shortfall, .. } if *shortfall <= self.options.threshold)
    }

    fn revise_record(&self, record: &CallRecord, db: &AlleleDatabase, genomes: &GenomeSet) -> Revision {
        let targets: Vec<&String> = record
            .calls
            .iter()
            .filter(|(_, call)| self.eligible(call))
            .map(|(locus, _)| locus)
            .collect();
        let has_novel = record.calls.values().any(|c| matches!(c, Call::New { .. }));

        // Novel sequences are already full length and need no genome
        if targets.is_empty() {
            return if has_novel {
                Revision::Revised {
                    record: record.clone(),
                    extended: 0,
                    locus_errors: Vec::new(),
                }
            } else {
                Revision::Unchanged(record.clone())
            };
        }

        let genome = match genomes.load(&record.genome) {
            Ok(genome) => genome,
            Err(e) => return Revision::Failed(record.clone(), e),
        };

        let mut revised = record.clone();
        let mut extended = 0;
        let mut locus_errors = Vec::new();
        for locus_name in targets {
            let locus = match db.read(locus_name) {
                Ok(locus) => locus,
                Err(e) => {
                    warn!("{} / {}: cannot extend: {}", record.genome, locus_name, e);
                    locus_errors.push((locus_name.clone(), e));
                    continue;
                }
            };
            let call = &record.calls[locus_name];
            if let Some(new_call) = extend_partial(call, &genome, &locus, self.options.identity_floor) {
                debug!(
                    "{} / {}: partial extended to {}",
                    record.genome,
                    locus_name,
                    new_call.label()
                );
                revised.insert_call(locus_name.clone(), new_call);
                extended += 1;
            }
        }

        Revision::Revised {
            record: revised,
            extended,
            locus_errors,
        }
    }

    /// Number every novel sequence, one exclusive section per locus.
    ///
    /// Loci are processed in parallel; within a locus sequences are appended
    /// in record order so id assignment is deterministic.
    fn append_novel(
        &self,
        records: &mut [CallRecord],
        eligible: &[bool],
        db: &AlleleDatabase,
    ) -> (
        BTreeMap<String, Vec<u32>>,
        BTreeMap<String, Vec<(usize, Call, u32)>>,
        Vec<(String, String)>,
    ) {
        let mut by_locus: BTreeMap<String, Vec<(usize, String)>> = BTreeMap::new();
        for (idx, record) in records.iter().enumerate() {
            if !eligible[idx] {
                continue;
            }
            for (locus, call) in &record.calls {
                if let Call::New { sequence, .. } = call {
                    by_locus
                        .entry(locus.clone())
                        .or_default()
                        .push((idx, sequence.clone()));
                }
            }
        }

        type Assignment = (usize, Result<(u32, bool)>);
        let results: Vec<(String, Result<Vec<Assignment>>)> = by_locus
            .into_par_iter()
            .map(|(locus_name, pending)| {
                let assigned = db.write(&locus_name).map(|mut locus| {
                    pending
                        .iter()
                        .map(|(idx, sequence)| (*idx, locus.append(sequence.as_bytes())))
                        .collect::<Vec<Assignment>>()
                });
                (locus_name, assigned)
            })
            .collect();

        let mut new_alleles: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        let mut assigned: BTreeMap<String, Vec<(usize, Call, u32)>> = BTreeMap::new();
        let mut failures = Vec::new();
        for (locus_name, appended) in results {
            let assignments = match appended {
                Ok(assignments) => assignments,
                Err(e) => {
                    warn!("Could not append novel alleles for {}: {}", locus_name, e);
                    failures.push((locus_name, e.to_string()));
                    continue;
                }
            };
            for (idx, outcome) in assignments {
                match outcome {
                    Ok((id, added)) => {
                        if added {
                            new_alleles.entry(locus_name.clone()).or_default().push(id);
                        }
                        if let Some(prior) = records[idx]
                            .calls
                            .insert(locus_name.clone(), Call::Exact { allele_id: id })
                        {
                            assigned
                                .entry(locus_name.clone())
                                .or_default()
                                .push((idx, prior, id));
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} / {}: novel sequence rejected: {}",
                            records[idx].genome, locus_name, e
                        );
                        failures.push((locus_name.clone(), e.to_string()));
                    }
                }
            }
        }

        for (locus, ids) in &new_alleles {
            info!("Locus {}: appended alleles {:?}", locus, ids);
        }
        (new_alleles, assigned, failures)
    }

    /// Revise call records against their genomes and grow the database.
    ///
    /// A record whose genome is missing is reported and left untouched; the
    /// remaining records are processed normally.
    pub fn update_records(&self, records: Vec<CallRecord>, db: &AlleleDatabase, genomes: &GenomeSet) -> UpdateOutcome {
        info!(
            "Updating {} records (extension threshold {} bp)",
            records.len(),
            self.options.threshold
        );

        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({percent}%)")
                .unwrap()
                .progress_chars("#>-"),
        );

        let revisions: Vec<Revision> = records
            .par_iter()
            .map(|record| {
                let revision = self.revise_record(record, db, genomes);
                pb.inc(1);
                revision
            })
            .collect();
        pb.finish_and_clear();

        let mut summary = BatchSummary::new("update");
        let mut revised = Vec::with_capacity(revisions.len());
        let mut eligible = Vec::with_capacity(revisions.len());
        let mut extended_total = 0;

        for revision in revisions {
            match revision {
                Revision::Revised {
                    record,
                    extended,
                    locus_errors,
                } => {
                    if locus_errors.is_empty() {
                        summary.succeed();
                    }
                    for (locus, e) in locus_errors {
                        summary.fail(format!("{}/{}", record.genome, locus), format!("{}: {}", e.kind(), e));
                    }
                    extended_total += extended;
                    revised.push(record);
                    eligible.push(true);
                }
                Revision::Unchanged(record) => {
                    summary.skip(record.genome.clone(), "no partial or novel calls to update");
                    revised.push(record);
                    eligible.push(false);
                }
                Revision::Failed(record, e) => {
                    warn!("Skipping update of {}: {}", record.genome, e);
                    summary.fail(record.genome.clone(), format!("{}: {}", e.kind(), e));
                    revised.push(record);
                    eligible.push(false);
                }
            }
        }

        let (new_alleles, assigned, append_failures) = if self.options.auto_append_novel {
            self.append_novel(&mut revised, &eligible, db)
        } else {
            (BTreeMap::new(), BTreeMap::new(), Vec::new())
        };

        info!(
            "{} ({} partial calls extended, {} new alleles)",
            summary,
            extended_total,
            new_alleles.values().map(Vec::len).sum::<usize>()
        );

        UpdateOutcome {
            records: revised,
            summary,
            extended: extended_total,
            new_alleles,
            append_failures,
            persisted: Vec::new(),
            persist_failures: Vec::new(),
            assigned,
        }
    }
}

/// Update a directory of JSON records in place and persist the allele directory
pub fn update_directory(
    json_dir: &Path,
    allele_dir: &Path,
    genome_dir: &Path,
    options: UpdateOptions,
) -> Result<UpdateOutcome> {
    let mut unreadable = Vec::new();
    let mut paths = Vec::new();
    let mut records = Vec::new();
    for path in list_record_files(json_dir)? {
        match CallRecord::from_json_file(&path) {
            Ok(record) => {
                paths.push(path);
                records.push(record);
            }
            Err(e) => {
                warn!("Skipping unreadable record {}: {}", path.display(), e);
                unreadable.push((path.display().to_string(), e.to_string()));
            }
        }
    }
    if records.is_empty() && unreadable.is_empty() {
        return Err(TypingError::NoInput(format!(
            "no call records found in {}",
            json_dir.display()
        )));
    }

    let db = AlleleDatabase::from_directory(allele_dir)?;
    let genomes = GenomeSet::from_directory(genome_dir)?;
    let originals = records.clone();

    let mut outcome = UpdateEngine::new(options).update_records(records, &db, &genomes);
    for (item, reason) in unreadable {
        outcome.summary.fail(item, reason);
    }

    outcome.record_persist(db.persist(allele_dir));

    for ((path, original), record) in paths.iter().zip(&originals).zip(&outcome.records) {
        if original == record {
            continue;
        }
        if let Err(e) = record.to_json_file(path) {
            warn!("Failed to rewrite {}: {}", path.display(), e);
            outcome
                .summary
                .fail(path.display().to_string(), e.to_string());
        }
    }

    Ok(outcome)
}
