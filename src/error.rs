//! Error types for cargodist.
//!
//! Gameplay-facing graph mutations never fail; they either apply or are
//! no-ops. The errors below cover the remaining recoverable surface:
//! rejected settings and damaged or incompatible snapshots.

use thiserror::Error;

use crate::types::{GraphId, JobId};

/// Validation errors raised while checking settings.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Setting '{setting}' is invalid: {reason}")]
    InvalidSetting {
        setting: String,
        reason: String,
    },

    #[error("Limit '{limit}' must be between 1 and {max}, got {actual}")]
    LimitOutOfRange {
        limit: String,
        max: usize,
        actual: usize,
    },
}

/// Errors raised while encoding, decoding or restoring a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is corrupt: {reason}")]
    Corrupt {
        reason: String,
    },

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion {
        found: u8,
        expected: u8,
    },

    #[error("Failed to serialize snapshot: {message}")]
    Serialization {
        message: String,
    },

    #[error("Snapshot contains graph {0} twice")]
    DuplicateGraph(GraphId),

    #[error("Snapshot contains job {0} twice")]
    DuplicateJob(JobId),
}

/// Top-level error type for cargodist.
#[derive(Debug, Error)]
pub enum DistError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl DistError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a snapshot error.
    #[must_use]
    pub const fn is_snapshot(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }
}

/// Result type alias for cargodist operations.
pub type DistResult<T> = Result<T, DistError>;
