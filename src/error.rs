//! Error taxonomy for the aggregation engine.
//!
//! Unlike a single opaque error type, callers need to branch on *kind*: a
//! `Config` error at startup means abort before any work begins, an `Io`
//! error means skip one file and keep going, a `Resource` error means abort
//! the worker that hit it. See spec §7 for the full propagation policy.

use std::path::PathBuf;
use thiserror::Error;

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum AggError {
    /// Invalid view-definition token, bad prefix length, unknown IE, or a
    /// malformed filter expression. Fatal at startup; no aggregation is
    /// performed.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Failure opening or reading an input file. Per-file: the worker logs
    /// once and continues with the next filename.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A malformed IPFIX record. Per-record: the record is dropped and a
    /// counter is incremented; no log is emitted (see §7 propagation
    /// policy — per-record errors are absorbed locally).
    #[error("failed to decode record: {detail}")]
    Decode { detail: String },

    /// Allocation failure during a hash-table insert. Fatal for the worker
    /// that hit it; propagates to the caller of the aggregation entry
    /// point.
    #[error("resource exhausted: {detail}")]
    Resource { detail: String },

    /// An invariant violation, e.g. a filter id outside the registered
    /// range, or a template snapshot missing for a record that needs it.
    #[error("internal invariant violated: {detail}")]
    Internal { detail: String },
}

impl AggError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::Decode {
            detail: detail.into(),
        }
    }

    pub fn resource(detail: impl Into<String>) -> Self {
        Self::Resource {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// True for errors that should abort the whole run rather than being
    /// absorbed by a single worker or record.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Resource { .. } | Self::Internal { .. })
    }
}

pub type Result<T> = std::result::Result<T, AggError>;
