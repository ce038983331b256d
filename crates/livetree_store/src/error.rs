//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a store reports for a failed operation.
///
/// The façade never reinterprets these; they travel to callers as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend refused the operation.
    ///
    /// Displays as the bare reason so callers see exactly what the
    /// backend reported.
    #[error("{reason}")]
    Rejected {
        /// Reason reported by the backend.
        reason: String,
    },

    /// A transaction could not commit within the attempt limit.
    #[error("maxretry")]
    TooManyRetries {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Creates a rejection carrying the given reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Returns the reason text as reported by the backend.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_displays_bare_reason() {
        let err = StoreError::rejected("failpush");
        assert_eq!(err.to_string(), "failpush");
        assert_eq!(err.reason(), "failpush");
    }

    #[test]
    fn error_display() {
        assert_eq!(
            StoreError::TooManyRetries { attempts: 25 }.to_string(),
            "maxretry"
        );
        assert_eq!(StoreError::Closed.to_string(), "store is closed");
    }
}
