//! Error taxonomy shared by every crate in the workspace.
//!
//! Kinds, not names: each variant corresponds to one of the failure classes
//! in the pipeline's error handling design, not to a specific call site.

use thiserror::Error;

/// The single error type returned by fallible operations across the
/// loader and query paths.
#[derive(Debug, Error)]
pub enum KboError {
    /// An identifier failed the allow-list or regex check before reaching
    /// SQL. Never retried.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A request parameter was out of range, empty, or missing.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The relational store or cache service could not be reached.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A per-chunk or per-hydration-batch operation failed; the caller
    /// continues past it.
    #[error("transient query failure: {0}")]
    TransientQuery(String),

    /// A cache payload exceeded the compression thresholds.
    #[error("dataset too large: {0}")]
    DatasetTooLarge(String),

    /// The bulk-load driver's reported row count diverged from the
    /// producer's emitted count.
    #[error("copy count mismatch: expected {expected}, got {actual}")]
    CopyCountMismatch { expected: u64, actual: u64 },

    /// A multi-criteria intersection was attempted with a criterion whose
    /// population was never materialized.
    #[error("cache miss for criterion: {0}")]
    CacheMiss(String),

    /// Internal: a cache probe found nothing at either key. Never surfaced
    /// directly to a user; triggers fallthrough to resolve-and-hydrate.
    #[error("not found")]
    NotFound,

    /// Wraps an underlying I/O, driver, or serialization error that doesn't
    /// fit a more specific variant above.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type KboResult<T> = Result<T, KboError>;
