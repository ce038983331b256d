//! Store configuration.

use serde::Deserialize;

/// Configuration for a [`crate::MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name shown in log fields and in node reference display.
    pub name: String,

    /// How many times a transaction update function may run before the
    /// transaction gives up with [`crate::StoreError::TooManyRetries`].
    pub max_transaction_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            max_transaction_attempts: 25,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the transaction attempt limit.
    #[must_use]
    pub const fn max_transaction_attempts(mut self, attempts: u32) -> Self {
        self.max_transaction_attempts = attempts;
        self
    }
}
