//! Error types for the Vernier annotation runtime.
//!
//! The runtime reports failures as values, never as panics. The public
//! surface is deliberately small: every [`Error`] variant maps onto one of
//! the four coarse [`ErrorKind`]s, so embedders that only care about the
//! closed contract can match on the kind and ignore the detail.

use thiserror::Error;

use vernier_types::{AttrId, EnvId, NodeId};

/// Primary error type for annotation-runtime operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Programmer errors (invalid-argument) ===
    /// The invalid attribute sentinel was passed to an annotation operation.
    #[error("invalid attribute")]
    InvalidAttribute,

    /// `end` was called with no live entry for the attribute.
    #[error("unmatched end for attribute {attr} in environment {env}")]
    UnmatchedEnd { env: EnvId, attr: AttrId },

    /// An environment id that was never allocated.
    #[error("no such environment: {env}")]
    NoSuchEnvironment { env: EnvId },

    /// A node id outside the populated range of the node vector.
    #[error("no such node: {node}")]
    NoSuchNode { node: NodeId },

    // === Fatal resource exhaustion (out-of-memory) ===
    /// A dense id counter would wrap into the invalid sentinel.
    #[error("{what} id space exhausted")]
    IdSpaceExhausted { what: &'static str },

    /// The node arena could not satisfy an allocation.
    #[error("arena exhausted allocating {requested} bytes")]
    ArenaExhausted { requested: usize },

    // === Service dispatch (not-found) ===
    /// `write_metadata` was asked for a writer service that is not registered.
    #[error("unknown writer service: '{name}'")]
    WriterNotFound { name: String },

    // === I/O ===
    /// A writer service failed to emit its output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The four-kind error surface of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid attribute sentinel, unmatched end, unknown environment.
    InvalidArgument,
    /// Arena or id-space exhaustion.
    OutOfMemory,
    /// Unknown writer service name.
    NotFound,
    /// Writer output failure.
    Io,
}

impl Error {
    /// Coarse classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAttribute
            | Error::UnmatchedEnd { .. }
            | Error::NoSuchEnvironment { .. }
            | Error::NoSuchNode { .. } => ErrorKind::InvalidArgument,
            Error::IdSpaceExhausted { .. } | Error::ArenaExhausted { .. } => ErrorKind::OutOfMemory,
            Error::WriterNotFound { .. } => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;
