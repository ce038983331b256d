//! Events, listeners and callbacks exchanged with a store.

use crate::error::StoreResult;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A change to the ordered children of a subscribed node.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    /// A child appeared, immediately after `prev_key` (or first).
    Added {
        /// Child key.
        key: String,
        /// Child value.
        value: Value,
        /// Key of the preceding child, `None` when first.
        prev_key: Option<String>,
    },
    /// A child's value changed.
    Changed {
        /// Child key.
        key: String,
        /// New child value.
        value: Value,
        /// Key of the preceding child, `None` when first.
        prev_key: Option<String>,
    },
    /// A child disappeared.
    Removed {
        /// Child key.
        key: String,
    },
    /// A child changed position, now immediately after `prev_key`.
    Moved {
        /// Child key.
        key: String,
        /// Key of the preceding child, `None` when first.
        prev_key: Option<String>,
    },
}

impl ChildEvent {
    /// Returns the key of the child this event concerns.
    pub fn key(&self) -> &str {
        match self {
            ChildEvent::Added { key, .. }
            | ChildEvent::Changed { key, .. }
            | ChildEvent::Removed { key }
            | ChildEvent::Moved { key, .. } => key,
        }
    }

    /// Returns a short name for the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ChildEvent::Added { .. } => "added",
            ChildEvent::Changed { .. } => "changed",
            ChildEvent::Removed { .. } => "removed",
            ChildEvent::Moved { .. } => "moved",
        }
    }
}

/// A change to the value of a subscribed node.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueEvent {
    /// The node's whole value.
    Snapshot(Value),
    /// New values for some top-level children; `null` deletes.
    ChildMerge(Map<String, Value>),
}

/// Identifies one subscription on a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// The caller-level operation a write implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Write under a freshly generated key.
    Push,
    /// Whole-value replace.
    Set,
    /// Key-by-key merge.
    Update,
    /// Delete.
    Remove,
    /// Atomic read-modify-write.
    Transaction,
    /// One-shot snapshot read.
    Read,
}

impl OperationKind {
    /// Returns the lowercase operation name.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Push => "push",
            OperationKind::Set => "set",
            OperationKind::Update => "update",
            OperationKind::Remove => "remove",
            OperationKind::Transaction => "transaction",
            OperationKind::Read => "read",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transaction update function wants to do with the current value.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionUpdate {
    /// Attempt to commit this value.
    Commit(Value),
    /// Leave the node unchanged.
    Abort,
}

/// Final state of a transaction that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    /// Whether a value was committed (false on voluntary abort).
    pub committed: bool,
    /// The node value after the transaction.
    pub value: Value,
}

/// Receives child events of one subscription.
pub type ChildListener = Arc<dyn Fn(ChildEvent) + Send + Sync>;

/// Receives value events of one subscription.
pub type ValueListener = Arc<dyn Fn(ValueEvent) + Send + Sync>;

/// Completion of a write or merge.
pub type WriteCallback = Box<dyn FnOnce(StoreResult<()>) + Send>;

/// Completion of a one-shot read.
pub type ReadCallback = Box<dyn FnOnce(StoreResult<Value>) + Send>;

/// Completion of a transaction.
pub type TransactionCallback = Box<dyn FnOnce(StoreResult<TransactionOutcome>) + Send>;

/// Transaction update function. May be invoked several times.
pub type TransactionFn = Box<dyn FnMut(&Value) -> TransactionUpdate + Send>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_key_and_kind() {
        let event = ChildEvent::Added {
            key: "a".into(),
            value: json!(1),
            prev_key: None,
        };
        assert_eq!(event.key(), "a");
        assert_eq!(event.kind(), "added");
        assert_eq!(ChildEvent::Removed { key: "b".into() }.kind(), "removed");
    }

    #[test]
    fn operation_names() {
        assert_eq!(OperationKind::Push.to_string(), "push");
        assert_eq!(OperationKind::Transaction.as_str(), "transaction");
        assert_eq!(SubscriptionId::new(7).to_string(), "sub#7");
    }
}
