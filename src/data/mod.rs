// mod.rs - Data structures module

pub mod allele;
pub mod genome;
pub mod record;

// Re-export main types for convenience
pub use allele::{AlleleDatabase, Locus};
pub use genome::{Contig, Genome};
pub use record::{Call, CallRecord};
