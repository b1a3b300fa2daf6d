// mod.rs - Core logic module

pub mod alignment;
pub mod caller;
pub mod options;
pub mod update;

// Re-export main types for convenience
pub use alignment::{compute_traceback_stats, reverse_complement, ungapped_identity, AlignmentConfig};
pub use caller::CallingEngine;
pub use options::{CallOptions, TypingConfig, UpdateOptions};
pub use update::{extend_partial, update_directory, GenomeSet, UpdateEngine, UpdateOutcome};
