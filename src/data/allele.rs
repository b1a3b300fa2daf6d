// allele.rs - Per-locus allele sets and the allele database directory

use crate::error::{Result, TypingError};
use bio::io::fasta;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File extensions recognised as FASTA
pub const FASTA_EXTENSIONS: &[&str] = &["fasta", "fa", "fas", "fna", "tfa"];

/// Check whether a path looks like a FASTA file
pub fn is_fasta_path(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| FASTA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Allele id from a FASTA record id of the form `<locus>_<id>` or `<id>`
pub fn parse_allele_id(record_id: &str) -> Option<u32> {
    let raw = record_id
        .rsplit_once('_')
        .map(|(_, id)| id)
        .unwrap_or(record_id);
    raw.parse::<u32>().ok().filter(|&id| id > 0)
}

/// Upper-case an allele sequence, rejecting symbols outside ACGTN
fn normalize_allele(sequence: &[u8]) -> std::result::Result<Vec<u8>, u8> {
    sequence
        .iter()
        .map(|&base| match base.to_ascii_uppercase() {
            b @ (b'A' | b'C' | b'G' | b'T' | b'N') => Ok(b),
            _ => Err(base),
        })
        .collect()
}

/// Known alleles of one locus.
///
/// Ids are unique and never repointed: `append` either returns the id already
/// bound to a sequence or binds the sequence to `next_id`.
#[derive(Debug, Clone)]
pub struct Locus {
    pub name: String,
    alleles: BTreeMap<u32, Vec<u8>>,
    index: HashMap<Vec<u8>, u32>,
    next_id: u32,
    appended: Vec<u32>,
    source: Option<PathBuf>,
}

impl Locus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alleles: BTreeMap::new(),
            index: HashMap::new(),
            next_id: 1,
            appended: Vec::new(),
            source: None,
        }
    }

    /// Build a locus from `(id, sequence)` pairs
    pub fn from_alleles<I, S>(name: impl Into<String>, alleles: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, S)>,
        S: AsRef<[u8]>,
    {
        let mut locus = Self::new(name);
        for (id, sequence) in alleles {
            locus.insert(id, sequence.as_ref())?;
        }
        Ok(locus)
    }

    /// Register a known allele under an explicit id
    pub fn insert(&mut self, id: u32, sequence: &[u8]) -> Result<()> {
        if id == 0 {
            return Err(TypingError::Configuration(format!(
                "Locus '{}': allele id 0 is not allowed",
                self.name
            )));
        }
        if self.alleles.contains_key(&id) {
            return Err(TypingError::Configuration(format!(
                "Locus '{}': duplicate allele id {}",
                self.name, id
            )));
        }
        if sequence.is_empty() {
            return Err(TypingError::Configuration(format!(
                "Locus '{}': allele {} has an empty sequence",
                self.name, id
            )));
        }
        let sequence = normalize_allele(sequence).map_err(|symbol| {
            TypingError::Configuration(format!(
                "Locus '{}': allele {} contains invalid symbol '{}'",
                self.name, id, symbol as char
            ))
        })?;
        let next_id = id.checked_add(1).ok_or_else(|| {
            TypingError::Configuration(format!(
                "Locus '{}': allele id {} is too large",
                self.name, id
            ))
        })?;

        // Duplicate sequences keep the lowest id in the reverse index
        let entry = self.index.entry(sequence.clone()).or_insert(id);
        if id < *entry {
            *entry = id;
        }
        self.alleles.insert(id, sequence);
        self.next_id = self.next_id.max(next_id);
        Ok(())
    }

    /// Append a sequence, returning its id and whether it was newly assigned
    pub fn append(&mut self, sequence: &[u8]) -> Result<(u32, bool)> {
        if let Some(id) = normalize_allele(sequence)
            .ok()
            .and_then(|normalized| self.id_of(&normalized))
        {
            return Ok((id, false));
        }
        let id = self.next_id;
        self.insert(id, sequence)?;
        self.appended.push(id);
        Ok((id, true))
    }

    pub fn get(&self, id: u32) -> Option<&[u8]> {
        self.alleles.get(&id).map(|s| s.as_slice())
    }

    /// Id of an allele with exactly this sequence
    pub fn id_of(&self, sequence: &[u8]) -> Option<u32> {
        self.index.get(sequence).copied()
    }

    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    /// Next id `append` would assign
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Alleles in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.alleles.iter().map(|(id, seq)| (*id, seq.as_slice()))
    }

    pub fn ids(&self) -> Vec<u32> {
        self.alleles.keys().copied().collect()
    }

    /// Ids appended since the locus was loaded
    pub fn appended(&self) -> &[u32] {
        &self.appended
    }

    pub fn is_modified(&self) -> bool {
        !self.appended.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Load one locus from a FASTA file; the locus name is the file stem
    pub fn from_fasta(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                TypingError::Configuration(format!("Invalid allele filename: {}", path.display()))
            })?
            .to_string();

        let file = File::open(path).map_err(|e| TypingError::io(path, e))?;
        let reader = fasta::Reader::new(BufReader::new(file));
        let mut locus = Self::new(name);
        locus.source = Some(path.to_path_buf());

        for record_result in reader.records() {
            let record = record_result.map_err(|e| {
                TypingError::Configuration(format!(
                    "Invalid FASTA record in {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let id = parse_allele_id(record.id()).ok_or_else(|| {
                TypingError::Configuration(format!(
                    "Cannot parse allele id from '{}' in {}",
                    record.id(),
                    path.display()
                ))
            })?;
            locus.insert(id, record.seq())?;
        }

        if locus.is_empty() {
            return Err(TypingError::Configuration(format!(
                "Locus '{}' has no reference alleles ({})",
                locus.name,
                path.display()
            )));
        }
        Ok(locus)
    }

    /// Atomically rewrite the locus as `<locus>_<id>` FASTA records
    pub fn write_fasta(&self, target: &Path) -> Result<()> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let persist_err = |message: String| TypingError::Persist {
            path: target.to_path_buf(),
            message,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| TypingError::io(dir, e))?;
        {
            let mut writer = fasta::Writer::new(tmp.as_file_mut());
            for (id, sequence) in self.iter() {
                writer
                    .write(&format!("{}_{}", self.name, id), None, sequence)
                    .map_err(|e| persist_err(e.to_string()))?;
            }
            writer.flush().map_err(|e| persist_err(e.to_string()))?;
        }
        tmp.persist(target)
            .map_err(|e| persist_err(e.error.to_string()))?;
        Ok(())
    }
}

/// All loci of an allele directory, each independently lockable
#[derive(Debug, Default)]
pub struct AlleleDatabase {
    pub directory: Option<PathBuf>,
    loci: BTreeMap<String, RwLock<Locus>>,
}

fn poisoned(locus: &str) -> TypingError {
    TypingError::Configuration(format!("Lock for locus '{}' was poisoned", locus))
}

impl AlleleDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every FASTA file of an allele directory, one locus per file
    pub fn from_directory(allele_dir: &Path) -> Result<Self> {
        info!("Loading alleles from directory: {}", allele_dir.display());

        let entries = std::fs::read_dir(allele_dir).map_err(|e| TypingError::io(allele_dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_fasta_path(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(TypingError::Configuration(format!(
                "No allele FASTA files found in {}",
                allele_dir.display()
            )));
        }

        let pb = ProgressBar::new(paths.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} loci loaded")
                .unwrap(),
        );

        let loci = paths
            .par_iter()
            .map(|path| {
                let locus = Locus::from_fasta(path);
                pb.inc(1);
                locus
            })
            .collect::<Result<Vec<_>>>()?;
        pb.finish_and_clear();

        let mut db = Self {
            directory: Some(allele_dir.to_path_buf()),
            loci: BTreeMap::new(),
        };
        for locus in loci {
            db.insert_locus(locus)?;
        }

        info!(
            "Allele database loaded: {} loci, {} alleles",
            db.len(),
            db.total_alleles()
        );
        Ok(db)
    }

    /// Add a locus; a locus name may occur only once
    pub fn insert_locus(&mut self, locus: Locus) -> Result<()> {
        if locus.is_empty() {
            return Err(TypingError::Configuration(format!(
                "Locus '{}' has no reference alleles",
                locus.name
            )));
        }
        if self.loci.contains_key(&locus.name) {
            return Err(TypingError::Configuration(format!(
                "Locus '{}' is defined more than once",
                locus.name
            )));
        }
        self.loci.insert(locus.name.clone(), RwLock::new(locus));
        Ok(())
    }

    /// Locus names in sorted order
    pub fn locus_names(&self) -> Vec<String> {
        self.loci.keys().cloned().collect()
    }

    pub fn contains(&self, locus: &str) -> bool {
        self.loci.contains_key(locus)
    }

    pub fn len(&self) -> usize {
        self.loci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loci.is_empty()
    }

    pub fn total_alleles(&self) -> usize {
        self.loci
            .values()
            .filter_map(|lock| lock.read().ok().map(|locus| locus.len()))
            .sum()
    }

    /// Shared access to one locus
    pub fn read(&self, locus: &str) -> Result<RwLockReadGuard<'_, Locus>> {
        self.loci
            .get(locus)
            .ok_or_else(|| TypingError::Configuration(format!("Unknown locus '{}'", locus)))?
            .read()
            .map_err(|_| poisoned(locus))
    }

    /// Exclusive access to one locus; other loci stay available
    pub fn write(&self, locus: &str) -> Result<RwLockWriteGuard<'_, Locus>> {
        self.loci
            .get(locus)
            .ok_or_else(|| TypingError::Configuration(format!("Unknown locus '{}'", locus)))?
            .write()
            .map_err(|_| poisoned(locus))
    }

    /// Snapshot of allele ids per locus
    pub fn allele_ids(&self) -> BTreeMap<String, Vec<u32>> {
        self.loci
            .iter()
            .filter_map(|(name, lock)| lock.read().ok().map(|locus| (name.clone(), locus.ids())))
            .collect()
    }

    /// Rewrite every modified locus file.
    ///
    /// Each locus is written independently; the result lists per-locus outcomes.
    pub fn persist(&self, allele_dir: &Path) -> Vec<(String, Result<PathBuf>)> {
        let modified: Vec<(&String, &RwLock<Locus>)> = self
            .loci
            .iter()
            .filter(|(_, lock)| lock.read().map(|l| l.is_modified()).unwrap_or(true))
            .collect();

        let results: Vec<(String, Result<PathBuf>)> = modified
            .par_iter()
            .map(|(name, lock)| {
                let outcome = lock.read().map_err(|_| poisoned(name)).and_then(|locus| {
                    let target = locus
                        .source()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| allele_dir.join(format!("{}.fasta", locus.name)));
                    locus.write_fasta(&target)?;
                    debug!(
                        "Persisted locus {} ({} new alleles) to {}",
                        locus.name,
                        locus.appended().len(),
                        target.display()
                    );
                    Ok(target)
                });
                if let Err(e) = &outcome {
                    warn!("Failed to persist locus {}: {}", name, e);
                }
                ((*name).clone(), outcome)
            })
            .collect();

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allele_id() {
        assert_eq!(parse_allele_id("abc_12"), Some(12));
        assert_eq!(parse_allele_id("my_locus_3"), Some(3));
        assert_eq!(parse_allele_id("7"), Some(7));
        assert_eq!(parse_allele_id("abc_0"), None);
        assert_eq!(parse_allele_id("abc_x"), None);
    }

    #[test]
    fn test_locus_insert_and_index() {
        let locus = Locus::from_alleles("abc", vec![(1, "ACGTACGT"), (2, "acgtacgg")]).unwrap();
        assert_eq!(locus.len(), 2);
        assert_eq!(locus.get(2), Some(&b"ACGTACGG"[..]));
        assert_eq!(locus.id_of(b"ACGTACGT"), Some(1));
        assert_eq!(locus.next_id(), 3);
    }

    #[test]
    fn test_locus_rejects_bad_alleles() {
        assert!(Locus::from_alleles("abc", vec![(1, "ACGT"), (1, "ACGA")]).is_err());
        assert!(Locus::from_alleles("abc", vec![(1, "ACGR")]).is_err());
        assert!(Locus::from_alleles("abc", vec![(0, "ACGT")]).is_err());
        assert!(Locus::from_alleles("abc", vec![(1, "")]).is_err());
    }

    #[test]
    fn test_append_is_monotonic_and_deduplicating() {
        let mut locus = Locus::from_alleles("abc", vec![(1, "ACGT"), (5, "ACGA")]).unwrap();
        assert_eq!(locus.append(b"ACGA").unwrap(), (5, false));
        assert_eq!(locus.append(b"TTTT").unwrap(), (6, true));
        assert_eq!(locus.append(b"GGGG").unwrap(), (7, true));
        assert_eq!(locus.get(1), Some(&b"ACGT"[..]));
        assert_eq!(locus.appended(), &[6, 7]);
    }

    #[test]
    fn test_append_matches_lowercase_sequence() {
        let mut locus = Locus::from_alleles("abc", vec![(1, "ACGTACGT")]).unwrap();
        assert_eq!(locus.append(b"acgtacgt").unwrap(), (1, false));
        assert!(!locus.is_modified());
        assert_eq!(locus.next_id(), 2);
    }

    #[test]
    fn test_largest_allele_id_is_rejected() {
        let err = Locus::from_alleles("abc", vec![(u32::MAX, "ACGT")]).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");

        let locus = Locus::from_alleles("abc", vec![(u32::MAX - 1, "ACGT")]).unwrap();
        assert_eq!(locus.next_id(), u32::MAX);
    }

    #[test]
    fn test_database_load_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.fasta"), ">abc_1\nACGTACGT\n>abc_2\nACGTACGG\n").unwrap();
        std::fs::write(dir.path().join("xyz.fa"), ">xyz_3\nTTTTGGGG\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let db = AlleleDatabase::from_directory(dir.path()).unwrap();
        assert_eq!(db.locus_names(), vec!["abc".to_string(), "xyz".to_string()]);
        assert_eq!(db.total_alleles(), 3);

        let (id, added) = db.write("xyz").unwrap().append(b"TTTTGGGA").unwrap();
        assert_eq!((id, added), (4, true));

        let results = db.persist(dir.path());
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());

        let reloaded = Locus::from_fasta(&dir.path().join("xyz.fa")).unwrap();
        assert_eq!(reloaded.ids(), vec![3, 4]);
        assert_eq!(reloaded.get(4), Some(&b"TTTTGGGA"[..]));

        let untouched = std::fs::read_to_string(dir.path().join("abc.fasta")).unwrap();
        assert!(untouched.starts_with(">abc_1"));
    }

    #[test]
    fn test_empty_locus_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.fasta"), "").unwrap();
        let err = AlleleDatabase::from_directory(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }
}
