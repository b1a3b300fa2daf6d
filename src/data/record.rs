// record.rs - Per-genome call records and their JSON form

use crate::error::{Result, TypingError};
use crate::search::Strand;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Typing outcome for one (genome, locus) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
    /// Observed sequence is byte-identical to a known allele
    Exact { allele_id: u32 },
    /// Full-length, high-identity hit whose sequence is not in the database
    New {
        sequence: String,
        contig: String,
        start: usize,
        end: usize,
        strand: Strand,
        best_allele_id: u32,
        identity: f64,
    },
    /// Best hit covers only part of the expected allele.
    ///
    /// `start..end` is the forward-strand contig span; `query_start..query_end`
    /// is the covered part of allele `best_allele_id`.
    Partial {
        best_allele_id: u32,
        contig: String,
        start: usize,
        end: usize,
        shortfall: usize,
        strand: Strand,
        query_start: usize,
        query_end: usize,
        allele_length: usize,
        contig_edge: bool,
    },
    /// No alignment cleared the identity/coverage floor
    Absent,
}

impl Call {
    pub fn label(&self) -> &'static str {
        match self {
            Call::Exact { .. } => "exact",
            Call::New { .. } => "new",
            Call::Partial { .. } => "partial",
            Call::Absent => "absent",
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Call::Partial { .. })
    }
}

/// One genome's typing result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub genome: String,
    #[serde(default)]
    pub calls: BTreeMap<String, Call>,
    /// Loci whose call failed, with the reason
    #[serde(default)]
    pub failures: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CallRecord {
    pub fn new(genome: impl Into<String>) -> Self {
        Self {
            genome: genome.into(),
            calls: BTreeMap::new(),
            failures: BTreeMap::new(),
            called_at: Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }

    /// Set the call for a locus, clearing any failure marker
    pub fn insert_call(&mut self, locus: impl Into<String>, call: Call) {
        let locus = locus.into();
        self.failures.remove(&locus);
        self.calls.insert(locus, call);
    }

    /// Mark a locus as failed, clearing any call
    pub fn insert_failure(&mut self, locus: impl Into<String>, message: impl Into<String>) {
        let locus = locus.into();
        self.calls.remove(&locus);
        self.failures.insert(locus, message.into());
    }

    /// Every locus mentioned by the record
    pub fn loci(&self) -> BTreeSet<&str> {
        self.calls
            .keys()
            .chain(self.failures.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn count_by_label(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for call in self.calls.values() {
            *counts.entry(call.label()).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| TypingError::Json {
            path: PathBuf::from(format!("<record {}>", self.genome)),
            source: e,
        })
    }

    /// Write the record as JSON to any writer (e.g. stdout)
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        let json = self.to_json_string()?;
        writeln!(writer, "{}", json).map_err(|e| TypingError::io("<output>", e))
    }

    /// Atomically write the record as JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| TypingError::io(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| TypingError::io(dir, e))?;
        writeln!(tmp, "{}", json).map_err(|e| TypingError::io(path, e))?;
        tmp.persist(path).map_err(|e| TypingError::Persist {
            path: path.to_path_buf(),
            message: e.error.to_string(),
        })?;
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TypingError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| TypingError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// JSON files of a record directory in file-name order
pub fn list_record_files(json_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(json_dir).map_err(|e| TypingError::io(json_dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Read every record of a directory; unreadable files are returned as errors
pub fn read_record_dir(json_dir: &Path) -> Result<Vec<(PathBuf, Result<CallRecord>)>> {
    Ok(list_record_files(json_dir)?
        .into_iter()
        .map(|path| {
            let record = CallRecord::from_json_file(&path);
            (path, record)
        })
        .collect())
}
