// mod.rs - Search adapters module root

pub mod exact;
pub mod parasail;
pub mod registry;
pub mod traits;

// Re-export main types for convenience
pub use exact::ExactSearch;
pub use parasail::ParasailSearch;
pub use registry::SearchRegistry;
pub use traits::{check_deadline, Alignment, SearchAdapter, SearchError, Strand};
