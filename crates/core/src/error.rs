//! Error types for recordchain
//!
//! Every error here is a synchronous contract violation reported to the caller
//! of the operation that tripped it. Nothing is retried internally, and no
//! error crosses the deferred-event boundary.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::value::Value;
use std::io;
use thiserror::Error;

/// Result type alias for recordchain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for recordchain
#[derive(Debug, Error)]
pub enum Error {
    /// A merge tried to replace a permanent id with a different value
    #[error("Id conflict on '{attribute}': cannot change {existing} to {attempted}")]
    IdConflict {
        /// Name of the id attribute
        attribute: String,
        /// The permanent id the record already carries
        existing: Value,
        /// The id the merge tried to write
        attempted: Value,
    },

    /// A listener was registered on a record whose id is already permanent
    #[error("Already resolved: cannot call {operation}, id has already been set")]
    AlreadyResolved {
        /// Operation that was rejected
        operation: &'static str,
    },

    /// `on_can_be_created` under the strict policy on a record that is already ready
    #[error("Already can be created: cannot add a callback when the record can already be created")]
    AlreadyCanBeCreated,

    /// Configuration could not be parsed or is inconsistent
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// I/O error while reading or writing a config file
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl Error {
    /// Build an `IdConflict` error
    pub fn id_conflict(attribute: impl Into<String>, existing: Value, attempted: Value) -> Self {
        Error::IdConflict {
            attribute: attribute.into(),
            existing,
            attempted,
        }
    }

    /// Whether this error reports a caller logic error on the event protocol
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Error::AlreadyResolved { .. } | Error::AlreadyCanBeCreated
        )
    }
}
