// table.rs - Tabulation merge of per-genome call records

use crate::data::record::read_record_dir;
use crate::data::{Call, CallRecord};
use crate::error::{Result, TypingError};
use crate::output::BatchSummary;
use crc32fast::Hasher;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Cell markers for everything that is not a numbered allele
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentinels {
    pub absent: String,
    pub not_tested: String,
    pub partial: String,
    pub failed: String,
    /// Prefix of novel calls, followed by the sequence CRC32 in hex
    pub new_prefix: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            absent: "-".to_string(),
            not_tested: "NA".to_string(),
            partial: "PARTIAL".to_string(),
            failed: "ERROR".to_string(),
            new_prefix: "NEW_".to_string(),
        }
    }
}

/// Options of the tabulation merge
#[derive(Debug, Clone)]
pub struct TabulateOptions {
    pub delimiter: u8,
    pub sentinels: Sentinels,
    pub include_loci: Option<Regex>,
    pub exclude_loci: Option<Regex>,
}

impl Default for TabulateOptions {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            sentinels: Sentinels::default(),
            include_loci: None,
            exclude_loci: None,
        }
    }
}

impl TabulateOptions {
    fn keeps(&self, locus: &str) -> bool {
        self.include_loci.as_ref().map_or(true, |re| re.is_match(locus))
            && !self.exclude_loci.as_ref().map_or(false, |re| re.is_match(locus))
    }
}

/// CRC32 fingerprint of a novel sequence
pub fn novel_fingerprint(sequence: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(sequence.to_ascii_uppercase().as_bytes());
    format!("{:08x}", hasher.finalize())
}

/// Render one call as a table cell
pub fn render_call(call: &Call, sentinels: &Sentinels) -> String {
    match call {
        Call::Exact { allele_id } => allele_id.to_string(),
        Call::New { sequence, .. } => {
            format!("{}{}", sentinels.new_prefix, novel_fingerprint(sequence))
        }
        Call::Partial { .. } => sentinels.partial.clone(),
        Call::Absent => sentinels.absent.clone(),
    }
}

fn render_cell(record: &CallRecord, locus: &str, sentinels: &Sentinels) -> String {
    if let Some(call) = record.calls.get(locus) {
        render_call(call, sentinels)
    } else if record.failures.contains_key(locus) {
        sentinels.failed.clone()
    } else {
        sentinels.not_tested.clone()
    }
}

fn table_error(e: impl std::fmt::Display) -> TypingError {
    TypingError::Persist {
        path: PathBuf::from("<table>"),
        message: e.to_string(),
    }
}

/// Merge records into one genome x locus table.
///
/// Columns are the sorted union of loci; rows keep the order of `records`.
pub fn tabulate(records: &[CallRecord], options: &TabulateOptions) -> Result<String> {
    if records.is_empty() {
        return Err(TypingError::NoInput("no call records to tabulate".to_string()));
    }

    let loci: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.loci())
        .filter(|locus| options.keeps(locus))
        .collect();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(std::iter::once("genome").chain(loci.iter().copied()))
        .map_err(table_error)?;

    for record in records {
        let row: Vec<String> = std::iter::once(record.genome.clone())
            .chain(
                loci.iter()
                    .map(|locus| render_cell(record, locus, &options.sentinels)),
            )
            .collect();
        writer.write_record(&row).map_err(table_error)?;
    }

    let bytes = writer.into_inner().map_err(table_error)?;
    String::from_utf8(bytes).map_err(table_error)
}

/// Tabulate every record of a JSON directory, in file-name order
pub fn tabulate_directory(json_dir: &Path, options: &TabulateOptions) -> Result<(String, BatchSummary)> {
    let mut summary = BatchSummary::new("tabulate");
    let mut records = Vec::new();

    for (path, outcome) in read_record_dir(json_dir)? {
        match outcome {
            Ok(record) => {
                summary.succeed();
                records.push(record);
            }
            Err(e) => {
                warn!("Skipping unreadable record {}: {}", path.display(), e);
                summary.fail(path.display().to_string(), e.to_string());
            }
        }
    }

    if records.is_empty() {
        return Err(TypingError::NoInput(format!(
            "no readable call records in {}",
            json_dir.display()
        )));
    }

    let table = tabulate(&records, options)?;
    info!("{}", summary);
    Ok((table, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Strand;

    fn record(genome: &str, calls: Vec<(&str, Call)>) -> CallRecord {
        let mut record = CallRecord::new(genome);
        for (locus, call) in calls {
            record.insert_call(locus, call);
        }
        record
    }

    fn new_call(sequence: &str) -> Call {
        Call::New {
            sequence: sequence.to_string(),
            contig: "c1".to_string(),
            start: 0,
            end: sequence.len(),
            strand: Strand::Forward,
            best_allele_id: 1,
            identity: 0.95,
        }
    }

    #[test]
    fn test_tabulate_union_and_not_tested() {
        let records = vec![
            record("g1", vec![("abc", Call::Exact { allele_id: 1 })]),
            record(
                "g2",
                vec![("abc", Call::Absent), ("xyz", Call::Exact { allele_id: 3 })],
            ),
        ];
        let table = tabulate(&records, &TabulateOptions::default()).unwrap();
        assert_eq!(table, "genome\tabc\txyz\ng1\t1\tNA\ng2\t-\t3\n");
    }

    #[test]
    fn test_tabulate_distinguishes_missing_categories() {
        let mut failed = record("g3", vec![("abc", new_call("ACGTACGA"))]);
        failed.insert_failure("xyz", "SearchError: timed out");
        let partial = record(
            "g4",
            vec![(
                "xyz",
                Call::Partial {
                    best_allele_id: 3,
                    contig: "c1".to_string(),
                    start: 0,
                    end: 6,
                    shortfall: 2,
                    strand: Strand::Forward,
                    query_start: 2,
                    query_end: 8,
                    allele_length: 8,
                    contig_edge: true,
                },
            )],
        );

        let table = tabulate(&[failed, partial], &TabulateOptions::default()).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        let fingerprint = novel_fingerprint("ACGTACGA");
        assert_eq!(lines[1], format!("g3\tNEW_{}\tERROR", fingerprint));
        assert_eq!(lines[2], "g4\tNA\tPARTIAL");
    }

    #[test]
    fn test_column_order_is_stable_across_input_order() {
        let a = record("a", vec![("zeta", Call::Exact { allele_id: 2 }), ("alpha", Call::Absent)]);
        let b = record("b", vec![("mid", Call::Exact { allele_id: 9 })]);
        let options = TabulateOptions::default();

        let ab = tabulate(&[a.clone(), b.clone()], &options).unwrap();
        let ba = tabulate(&[b, a], &options).unwrap();
        let ab_lines: Vec<&str> = ab.lines().collect();
        let ba_lines: Vec<&str> = ba.lines().collect();

        assert_eq!(ab_lines[0], "genome\talpha\tmid\tzeta");
        assert_eq!(ab_lines[0], ba_lines[0]);
        assert_eq!(ab_lines[1], ba_lines[2]);
        assert_eq!(ab_lines[2], ba_lines[1]);
    }

    #[test]
    fn test_same_novel_sequence_renders_identically() {
        let sentinels = Sentinels::default();
        assert_eq!(
            render_call(&new_call("ACGTACGA"), &sentinels),
            render_call(&new_call("acgtacga"), &sentinels)
        );
        assert_ne!(
            render_call(&new_call("ACGTACGA"), &sentinels),
            render_call(&new_call("ACGTACGC"), &sentinels)
        );
    }

    #[test]
    fn test_custom_delimiter_and_filters() {
        let records = vec![record(
            "g1",
            vec![
                ("abc", Call::Exact { allele_id: 1 }),
                ("abd", Call::Exact { allele_id: 2 }),
                ("xyz", Call::Exact { allele_id: 3 }),
            ],
        )];
        let options = TabulateOptions {
            delimiter: b',',
            include_loci: Some(Regex::new("^ab").unwrap()),
            exclude_loci: Some(Regex::new("d$").unwrap()),
            ..TabulateOptions::default()
        };
        assert_eq!(tabulate(&records, &options).unwrap(), "genome,abc\ng1,1\n");
    }

    #[test]
    fn test_no_records_is_no_input_error() {
        let err = tabulate(&[], &TabulateOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "NoInputError");

        let dir = tempfile::tempdir().unwrap();
        let err = tabulate_directory(dir.path(), &TabulateOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "NoInputError");
    }

    #[test]
    fn test_tabulate_directory_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        record("g1", vec![("abc", Call::Exact { allele_id: 1 })])
            .to_json_file(&dir.path().join("g1.json"))
            .unwrap();
        std::fs::write(dir.path().join("g2.json"), "[]").unwrap();

        let (table, summary) = tabulate_directory(dir.path(), &TabulateOptions::default()).unwrap();
        assert_eq!(table, "genome\tabc\ng1\t1\n");
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }
}
