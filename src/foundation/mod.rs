/// Small value types shared across the pipeline.
pub mod core;
/// Error type and result alias.
pub mod error;
/// Device options.
pub mod opts;
