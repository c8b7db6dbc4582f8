//! Error handling for the garbage collector.
//!
//! This module provides the error type system for the collector, covering
//! configuration validation and background-thread coordination failures.

/// Garbage collector result type
///
/// This is a type alias for the standard library's [`Result`](core::result::Result) type with the
/// error type defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors that can occur while configuring or coordinating the collector.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration validation error
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Thread synchronization error
    #[error("thread synchronization error: {0}")]
    Sync(String),
}
