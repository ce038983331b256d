//! Error types for the façade.

use livetree_store::StoreError;
use thiserror::Error;

/// Result type for façade operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by bindings and live views.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The value given to a constructor is not a node reference.
    ///
    /// Returned synchronously; never delivered through a
    /// [`crate::Deferred`].
    #[error("not a valid node reference: {found}")]
    InvalidReference {
        /// Description of what was given instead.
        found: String,
    },

    /// The backend failed a write, read or transaction.
    ///
    /// Carries the backend's error untouched.
    #[error("{0}")]
    BackendOperationFailed(#[from] StoreError),

    /// A child key that names no child, such as `""` or `"/"`.
    #[error("invalid child key: {key:?}")]
    InvalidKey {
        /// The key that was given.
        key: String,
    },

    /// A query-scoped record was saved with a non-object value, which
    /// would replace children the query does not show.
    #[error("cannot replace {node} through a query with a non-object value")]
    QueryReplace {
        /// The underlying node.
        node: String,
    },

    /// A live collection was asked to save a record it does not hold.
    #[error("no record with key {key:?} in this collection")]
    UnknownRecord {
        /// The key that was asked for.
        key: String,
    },
}

impl SyncError {
    /// Returns the backend error, if this is a backend failure.
    pub fn backend_error(&self) -> Option<&StoreError> {
        match self {
            SyncError::BackendOperationFailed(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the reason text of a backend failure.
    pub fn reason(&self) -> Option<String> {
        self.backend_error().map(StoreError::reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failure_keeps_reason() {
        let err: SyncError = StoreError::rejected("failpush").into();
        assert_eq!(err.to_string(), "failpush");
        assert_eq!(err.reason().as_deref(), Some("failpush"));
        assert_eq!(err.backend_error(), Some(&StoreError::rejected("failpush")));
    }

    #[test]
    fn error_display() {
        let err = SyncError::InvalidReference {
            found: "string \"hello world\"".into(),
        };
        assert!(err.to_string().contains("valid node reference"));
        assert_eq!(err.reason(), None);

        let err = SyncError::UnknownRecord { key: "k1".into() };
        assert!(err.to_string().contains("k1"));
    }
}
