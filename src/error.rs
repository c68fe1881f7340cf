//! Crate-wide error type.

use thiserror::Error;

/// Errors returned by table construction, mutation and lookup entry points.
///
/// Type-level checks (`TypeMismatch`, `UnsupportedKeyType`,
/// `InvalidOperationOnUntyped`) are performed once at the call boundary;
/// per-element loops never produce them.
#[derive(Debug, Error)]
pub enum Error {
    /// A key or value supplied at a call site disagrees with the table's
    /// declared types.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// No specialized implementation exists for the requested key type.
    #[error("unsupported key type: {key_type}")]
    UnsupportedKeyType { key_type: &'static str },

    /// Backing memory for `requested` entries could not be obtained.
    #[error("allocation failed while reserving {requested} entries")]
    AllocationError { requested: usize },

    /// An operation was invoked on a map whose key/value types are not
    /// resolved yet.
    #[error("`{operation}` called on an untyped map")]
    InvalidOperationOnUntyped { operation: &'static str },

    /// A write overlapped a read phase (or another write) on the same table.
    #[error("access conflict: {0}")]
    AccessConflict(&'static str),

    /// Two arrays that must be positionally aligned have different lengths.
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// The worker pool for parallel lookups could not be created.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
