//! Bindings: the entry point of the façade.

use crate::collection::LiveCollection;
use crate::config::BindingConfig;
use crate::error::{SyncError, SyncResult};
use crate::record::LiveRecord;
use crate::writable::Writable;
use livetree_store::NodeRef;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Something a caller may try to bind.
///
/// Only node references qualify. Other implementors exist so that
/// passing, say, a URL string is rejected with
/// [`SyncError::InvalidReference`] instead of being misread.
pub trait BindTarget {
    /// Returns the node reference, if this is one.
    fn node_ref(&self) -> Option<NodeRef>;

    /// Describes the value for error messages.
    fn describe(&self) -> String;
}

impl BindTarget for NodeRef {
    fn node_ref(&self) -> Option<NodeRef> {
        Some(self.clone())
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl<T: BindTarget + ?Sized> BindTarget for &T {
    fn node_ref(&self) -> Option<NodeRef> {
        (**self).node_ref()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl BindTarget for str {
    fn node_ref(&self) -> Option<NodeRef> {
        None
    }

    fn describe(&self) -> String {
        format!("string {self:?}")
    }
}

impl BindTarget for String {
    fn node_ref(&self) -> Option<NodeRef> {
        None
    }

    fn describe(&self) -> String {
        self.as_str().describe()
    }
}

impl BindTarget for Value {
    fn node_ref(&self) -> Option<NodeRef> {
        None
    }

    fn describe(&self) -> String {
        format!("JSON value {self}")
    }
}

#[derive(Default)]
struct Views {
    collection: Option<LiveCollection>,
    record: Option<LiveRecord>,
}

/// Promise-style access to one node.
///
/// A binding holds only the node reference: writes go straight to the
/// backend (see [`Writable`]) and it caches no data. Live views created
/// through it are shared, so asking twice returns the same view until
/// that view is destroyed.
#[derive(Clone)]
pub struct Binding {
    node: NodeRef,
    config: BindingConfig,
    views: Arc<Mutex<Views>>,
}

impl Binding {
    /// Binds `target` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidReference`] if `target` is not a node
    /// reference.
    pub fn new(target: impl BindTarget) -> SyncResult<Self> {
        Self::with_config(target, BindingConfig::default())
    }

    /// Binds `target` with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidReference`] if `target` is not a node
    /// reference.
    pub fn with_config(target: impl BindTarget, config: BindingConfig) -> SyncResult<Self> {
        let node = target.node_ref().ok_or_else(|| SyncError::InvalidReference {
            found: target.describe(),
        })?;
        Ok(Self {
            node,
            config,
            views: Arc::new(Mutex::new(Views::default())),
        })
    }

    /// Returns the bound node reference, unchanged.
    pub fn node_ref(&self) -> &NodeRef {
        &self.node
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Returns the live collection over this node, creating it on first
    /// use or after the previous one was destroyed.
    pub fn to_collection(&self) -> LiveCollection {
        let mut views = self.views.lock();
        match &views.collection {
            Some(collection) if !collection.is_destroyed() => collection.clone(),
            _ => {
                let collection = LiveCollection::new(self.node.clone(), self.config.clone());
                views.collection = Some(collection.clone());
                collection
            }
        }
    }

    /// Returns the live record over this node, creating it on first use
    /// or after the previous one was destroyed.
    pub fn to_record(&self) -> LiveRecord {
        let mut views = self.views.lock();
        match &views.record {
            Some(record) if !record.is_destroyed() => record.clone(),
            _ => {
                let record = LiveRecord::new(self.node.clone(), self.config.clone());
                views.record = Some(record.clone());
                record
            }
        }
    }
}

impl Writable for Binding {
    fn target(&self) -> &NodeRef {
        &self.node
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}
