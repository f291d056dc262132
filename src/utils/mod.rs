//! Utility functions and helpers.
//!
//! - [`hash`]: XXH3 content hashing with memory mapping for large files
//! - [`thread_pool`]: The shared Rayon pool used for hashing and copying
//! - [`formatters`]: Colored and plain rendering of changes and snapshot times

/// Output formatting and colorization
pub mod formatters;
/// Content hashing
pub mod hash;
/// Thread pool configuration for parallel operations
pub mod thread_pool;
