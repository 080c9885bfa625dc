//! Transactional access to the persisted note document.
//!
//! # Responsibility
//! - Provide the only path through which the document is read or written.
//! - Run every logical operation as one load -> mutate -> persist cycle.
//!
//! # Invariants
//! - Transactions against the same store never interleave.
//! - A transaction persists only when its closure reports a change.
//! - Write paths validate the document before it replaces the current one.
//! - Callers never hold document state outside a transaction.

use crate::model::document::{Document, DocumentValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

pub mod file_store;
pub mod memory_store;

pub use file_store::FileDocumentStore;
pub use memory_store::MemoryDocumentStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failure raised by a document transaction.
#[derive(Debug)]
pub enum StoreError {
    /// Store file could not be read, written or replaced.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Persisted document is unparsable or violates document invariants.
    Corrupt { path: PathBuf, reason: String },
    /// Transaction produced a document that violates document invariants;
    /// nothing was written.
    Invalid(DocumentValidationError),
    /// In-memory document could not be serialized.
    Serialize(serde_json::Error),
    /// Persisted document was written by a newer format version.
    UnsupportedVersion { found: u32, supported: u32 },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Display) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "store_io",
            Self::Corrupt { .. } => "store_corrupt",
            Self::Invalid(_) => "store_invalid",
            Self::Serialize(_) => "store_serialize",
            Self::UnsupportedVersion { .. } => "store_version",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "store I/O failure at `{}`: {source}", path.display())
            }
            Self::Corrupt { path, reason } => {
                write!(f, "store document `{}` is corrupt: {reason}", path.display())
            }
            Self::Invalid(err) => write!(f, "refusing to persist invalid document: {err}"),
            Self::Serialize(err) => write!(f, "failed to serialize document: {err}"),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "document format version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Invalid(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Corrupt { .. } | Self::UnsupportedVersion { .. } => None,
        }
    }
}

impl From<DocumentValidationError> for StoreError {
    fn from(value: DocumentValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Result of a transaction closure: the value to return plus whether the
/// document was modified and must be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome<R> {
    value: R,
    changed: bool,
}

impl<R> TxOutcome<R> {
    /// The closure mutated the document; persist it.
    pub fn changed(value: R) -> Self {
        Self {
            value,
            changed: true,
        }
    }

    /// The closure left the document untouched; skip the write.
    pub fn unchanged(value: R) -> Self {
        Self {
            value,
            changed: false,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn into_value(self) -> R {
        self.value
    }
}

/// Transactional document store contract.
///
/// Implementations guarantee that `transact` calls are mutually exclusive and
/// that a persisted document is never observed half-written.
pub trait DocumentStore: Send + Sync {
    /// Loads the current document, runs `f` with exclusive access, and persists
    /// the result when `f` reports a change.
    fn transact<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Document) -> TxOutcome<R>;

    /// Read-only transaction; never persists.
    fn read<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Document) -> R,
    {
        self.transact(|doc| TxOutcome::unchanged(f(doc)))
    }
}

impl<S: DocumentStore> DocumentStore for Arc<S> {
    fn transact<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Document) -> TxOutcome<R>,
    {
        self.as_ref().transact(f)
    }
}
