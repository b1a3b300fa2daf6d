// mod.rs - CLI module

pub mod args;
pub mod config;
pub mod merge;
pub mod validation;

// Re-export main types for convenience
pub use args::{Args, CallArgs, Command, TabulateArgs, UpdateArgs};
pub use config::Config;
pub use merge::Settings;
pub use validation::{validate_args, validate_settings, ValidationResult};
