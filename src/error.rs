//! Crate-wide error type.

use std::borrow::Cow;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ReconstructError>;

/// Errors surfaced by reconstruction, unpacking and chunk I/O.
#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error("required column `{column}` is missing")]
    MissingColumn { column: Cow<'static, str> },

    #[error("column `{column}` is invalid: {reason}")]
    InvalidColumn {
        column: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("column `{column}` must hold a single value across all rows")]
    InconsistentScalar { column: Cow<'static, str> },

    #[error(
        "storage bitwidth {storage_bitwidth} does not split into dstream_S ({dstream_s}) sites of at least one bit"
    )]
    BitwidthMismatch {
        storage_bitwidth: u64,
        dstream_s: u64,
    },

    #[error("artifact {data_id} is malformed: {reason}")]
    MalformedArtifact {
        data_id: u64,
        reason: Cow<'static, str>,
    },

    #[error(
        "artifact {data_id} has T={t} after an artifact with T={previous_t}; \
         artifacts must arrive in nondecreasing T"
    )]
    OutOfOrderArtifact { data_id: u64, t: u64, previous_t: u64 },

    #[error("artifact {data_id} has an unsupported shape: {reason}")]
    UnsupportedShape {
        data_id: u64,
        reason: Cow<'static, str>,
    },

    #[error("unsupported retention algorithm `{algo}`")]
    UnsupportedAlgorithm { algo: String },

    #[error("row {row}: invalid data_hex ({reason})")]
    InvalidHex {
        row: usize,
        reason: Cow<'static, str>,
    },

    #[error(
        "reconstruction produced multiple independent trees ({roots} children of the root); \
         set force_common_ancestry to join them under a common ancestor"
    )]
    MultipleRoots { roots: usize },

    #[error("invariant `{check}` violated: {detail}")]
    InvariantViolation { check: &'static str, detail: String },

    #[error("unsupported dataframe file `{path}` (expected .csv, .arrow, .ipc or .feather)")]
    UnsupportedFormat { path: String },

    #[error("chunk worker failed: {reason}")]
    Worker { reason: Cow<'static, str> },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ReconstructError {
    /// True for errors caused by the caller's input rather than the environment.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            Self::Io(_) | Self::Worker { .. } | Self::InvariantViolation { .. }
        )
    }
}
