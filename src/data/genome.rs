// genome.rs - Genome assemblies as named contig sets

use crate::data::allele::is_fasta_path;
use crate::error::{Result, TypingError};
use bio::io::fasta;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// One assembled contig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub id: String,
    pub sequence: Vec<u8>,
}

impl Contig {
    pub fn new(id: impl Into<String>, sequence: impl AsRef<[u8]>) -> Self {
        Self {
            id: id.into(),
            sequence: normalize_contig(sequence.as_ref()),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Upper-case a contig; anything that is not ACGT becomes N
fn normalize_contig(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .map(|&base| match base.to_ascii_uppercase() {
            b @ (b'A' | b'C' | b'G' | b'T') => b,
            _ => b'N',
        })
        .collect()
}

/// A named assembly
#[derive(Debug, Clone)]
pub struct Genome {
    pub name: String,
    pub contigs: Vec<Contig>,
}

impl Genome {
    /// Build a genome, rejecting empty or ambiguous contig sets
    pub fn new(name: impl Into<String>, contigs: Vec<Contig>) -> Result<Self> {
        let name = name.into();
        if contigs.is_empty() {
            return Err(TypingError::Input(format!("Genome '{}' has no contigs", name)));
        }
        let mut seen = HashSet::new();
        for contig in &contigs {
            if contig.id.is_empty() {
                return Err(TypingError::Input(format!(
                    "Genome '{}' has a contig without an identifier",
                    name
                )));
            }
            if !seen.insert(contig.id.as_str()) {
                return Err(TypingError::Input(format!(
                    "Genome '{}' has duplicate contig '{}'",
                    name, contig.id
                )));
            }
        }
        Ok(Self { name, contigs })
    }

    /// Load a genome from FASTA; the genome name is the file stem
    pub fn from_fasta(path: &Path) -> Result<Self> {
        let name = genome_name(path)?;
        let file = File::open(path).map_err(|e| TypingError::io(path, e))?;
        let reader = fasta::Reader::new(BufReader::new(file));

        let mut contigs = Vec::new();
        for record_result in reader.records() {
            let record = record_result.map_err(|e| {
                TypingError::Input(format!("Invalid FASTA record in {}: {}", path.display(), e))
            })?;
            contigs.push(Contig::new(record.id(), record.seq()));
        }

        Self::new(name, contigs)
    }

    pub fn contig(&self, id: &str) -> Option<&Contig> {
        self.contigs.iter().find(|c| c.id == id)
    }

    pub fn total_length(&self) -> usize {
        self.contigs.iter().map(Contig::len).sum()
    }
}

/// Genome name for a FASTA path
pub fn genome_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| TypingError::Input(format!("Invalid genome filename: {}", path.display())))
}

/// Map genome name to FASTA path for every FASTA file in a directory
pub fn index_genome_dir(genome_dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let entries = std::fs::read_dir(genome_dir).map_err(|e| TypingError::io(genome_dir, e))?;
    let mut genomes = BTreeMap::new();

    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if !is_fasta_path(&path) {
            continue;
        }
        let name = genome_name(&path)?;
        if let Some(previous) = genomes.insert(name.clone(), path.clone()) {
            return Err(TypingError::Input(format!(
                "Genome '{}' is provided twice ({} and {})",
                name,
                previous.display(),
                path.display()
            )));
        }
    }

    Ok(genomes)
}
