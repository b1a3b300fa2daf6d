// lib.rs - mlstcall library root

//! # mlstcall - Allele calling and schema maintenance for MLST typing
//!
//! This library assigns each locus of an MLST scheme an allele call per
//! genome, grows the allele schema from partial and novel hits, and merges
//! per-genome call records into one genome x locus table.
//!
//! ## Features
//!
//! - **Allele calling**: both strands, local alignment via parasail or exact matching
//! - **Schema update**: extends near-complete partial hits and numbers novel alleles
//! - **Tabulation**: genome x locus profiles with distinct markers for every non-call
//! - **Parallel**: genomes and loci processed with rayon, one lock per locus
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use mlstcall::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let db = AlleleDatabase::from_directory(Path::new("alleles"))?;
//! let genome = Genome::from_fasta(Path::new("genomes/sample1.fasta"))?;
//!
//! let engine = CallingEngine::new(Arc::new(ParasailSearch::default()), CallOptions::default());
//! let record = engine.call_genome(&genome, &db, &db.locus_names());
//!
//! let table = tabulate(&[record], &TabulateOptions::default())?;
//! print!("{}", table);
//! # Ok::<(), mlstcall::TypingError>(())
//! ```

pub mod cli;
pub mod core;
pub mod data;
pub mod error;
pub mod output;
pub mod search;

// Convenience prelude for common imports
pub mod prelude {
    pub use crate::core::{AlignmentConfig, CallOptions, TypingConfig, UpdateOptions};
    pub use crate::core::{CallingEngine, GenomeSet, UpdateEngine, UpdateOutcome};
    pub use crate::data::{AlleleDatabase, Call, CallRecord, Contig, Genome, Locus};
    pub use crate::error::{Result, TypingError};
    pub use crate::output::{tabulate, BatchSummary, Sentinels, TabulateOptions};
    pub use crate::search::{Alignment, ExactSearch, ParasailSearch, SearchAdapter, SearchRegistry, Strand};
}

// Re-export main types at the root level for convenience
pub use crate::core::{CallingEngine, TypingConfig, UpdateEngine};
pub use crate::data::{AlleleDatabase, Call, CallRecord, Genome};
pub use crate::error::TypingError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn get_info() -> String {
    format!("mlstcall v{} - MLST allele caller and schema updater", VERSION)
}
