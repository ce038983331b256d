//! Binding configuration.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Caller-supplied rendering of one record.
///
/// Called with the record key and the default rendering (identity field
/// included); its return value replaces that rendering.
#[derive(Clone)]
pub struct RecordMapper(Arc<dyn Fn(&str, &Value) -> Value + Send + Sync>);

impl RecordMapper {
    /// Wraps `map`.
    pub fn new(map: impl Fn(&str, &Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(map))
    }

    /// Renders the record `key` from its default rendering.
    pub fn apply(&self, key: &str, rendered: &Value) -> Value {
        (self.0)(key, rendered)
    }
}

impl PartialEq for RecordMapper {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for RecordMapper {}

impl fmt::Debug for RecordMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordMapper(..)")
    }
}

/// Configuration shared by a binding and the live views it creates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Field under which a record's own key is exposed. Read-only: data
    /// arriving under this name is ignored and saves strip it.
    pub identity_field: String,

    /// Field under which a scalar record value is exposed.
    pub value_field: String,

    /// Optional hook applied to every rendered record.
    #[serde(skip)]
    pub record_mapper: Option<RecordMapper>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            identity_field: "$id".to_string(),
            value_field: "$value".to_string(),
            record_mapper: None,
        }
    }
}

impl BindingConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identity field name.
    #[must_use]
    pub fn identity_field(mut self, name: impl Into<String>) -> Self {
        self.identity_field = name.into();
        self
    }

    /// Sets the scalar value field name.
    #[must_use]
    pub fn value_field(mut self, name: impl Into<String>) -> Self {
        self.value_field = name.into();
        self
    }

    /// Sets the hook that renders each record.
    #[must_use]
    pub fn record_mapper(
        mut self,
        map: impl Fn(&str, &Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.record_mapper = Some(RecordMapper::new(map));
        self
    }

    /// Renders the record `key` through the hook, if one is set.
    pub(crate) fn render(&self, key: &str, rendered: Value) -> Value {
        match &self.record_mapper {
            Some(mapper) => mapper.apply(key, &rendered),
            None => rendered,
        }
    }
}
