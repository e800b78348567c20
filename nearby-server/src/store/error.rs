//! Storage error types.

use std::time::Duration;

/// Errors from a storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing files failed
    #[error("I/O error {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Stored data could not be decoded
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The store did not answer within the deadline
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            context: context.into(),
            source,
        }
    }
}
