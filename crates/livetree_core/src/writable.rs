//! The write surface shared by bindings and live views.

use crate::deferred::Deferred;
use crate::error::SyncError;
use livetree_store::{
    NodePath, NodeRef, OperationKind, Snapshot, TransactionUpdate, WriteCallback,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Promise-style writes against a node.
///
/// Implementors only supply [`target`](Writable::target); every write is
/// implemented here once. Each call issues one backend operation and
/// returns immediately; the returned [`Deferred`] settles on a later
/// queue turn with the backend's outcome. Failures are never retried.
///
/// When the target is a query, writes go to the underlying node: `set`,
/// `remove` and `update` act on the whole node, not only on the children
/// the query currently matches.
pub trait Writable {
    /// Returns the node writes are aimed at.
    fn target(&self) -> &NodeRef;

    /// Writes `value` under a new chronologically ordered key and
    /// resolves with the new child.
    fn push(&self, value: Value) -> Deferred<NodeRef> {
        let target = self.target();
        let key = target.store().generate_child_key();
        write_node(target.child(&key), value, OperationKind::Push)
    }

    /// Replaces the whole node with `value` (any shape; `null` deletes)
    /// and resolves with the node itself.
    fn set(&self, value: Value) -> Deferred<NodeRef> {
        write_node(self.target().unscoped(), value, OperationKind::Set)
    }

    /// Replaces the child `key` with `value` and resolves with the child.
    fn set_child(&self, key: &str, value: Value) -> Deferred<NodeRef> {
        match child_node(self.target(), key) {
            Ok(child) => write_node(child, value, OperationKind::Set),
            Err(err) => rejected(self.target(), err),
        }
    }

    /// Deletes the node and resolves with it.
    fn remove(&self) -> Deferred<NodeRef> {
        write_node(self.target().unscoped(), Value::Null, OperationKind::Remove)
    }

    /// Deletes the child `key` and resolves with the child.
    fn remove_child(&self, key: &str) -> Deferred<NodeRef> {
        match child_node(self.target(), key) {
            Ok(child) => write_node(child, Value::Null, OperationKind::Remove),
            Err(err) => rejected(self.target(), err),
        }
    }

    /// Overwrites each listed top-level key of the node (`null` deletes),
    /// leaving other keys untouched, and resolves with the node.
    fn update(&self, values: Map<String, Value>) -> Deferred<NodeRef> {
        merge_node(self.target().unscoped(), values)
    }

    /// Like [`update`](Writable::update), on the child `key`.
    fn update_child(&self, key: &str, values: Map<String, Value>) -> Deferred<NodeRef> {
        match child_node(self.target(), key) {
            Ok(child) => merge_node(child, values),
            Err(err) => rejected(self.target(), err),
        }
    }

    /// Runs an atomic read-modify-write on the node.
    ///
    /// `update` receives the current value and returns the value to
    /// commit or [`TransactionUpdate::Abort`]; the backend may call it
    /// more than once. Resolves with the committed snapshot, or `None`
    /// when `update` aborted.
    fn transaction<F>(&self, update: F) -> Deferred<Option<Snapshot>>
    where
        F: FnMut(&Value) -> TransactionUpdate + Send + 'static,
        Self: Sized,
    {
        let node = self.target().unscoped();
        let store = node.store();
        let deferred = Deferred::new(store.task_queue().clone());
        let settle = deferred.clone();
        let committed_node = node.clone();
        debug!(node = %node, "transaction issued");
        store.run_transaction(
            node.path(),
            Box::new(update),
            Box::new(move |result| match result {
                Ok(outcome) if outcome.committed => {
                    settle.resolve(Some(Snapshot::new(committed_node, outcome.value)));
                }
                Ok(_) => {
                    settle.resolve(None);
                }
                Err(err) => {
                    warn!(node = %committed_node, error = %err, "transaction failed");
                    settle.reject(err.into());
                }
            }),
        );
        deferred
    }
}

fn write_node(node: NodeRef, value: Value, kind: OperationKind) -> Deferred<NodeRef> {
    debug!(node = %node, %kind, "write issued");
    let store = node.store();
    let (deferred, done) = settle_with(&node, kind);
    store.write(node.path(), value, kind, done);
    deferred
}

fn merge_node(node: NodeRef, values: Map<String, Value>) -> Deferred<NodeRef> {
    if let Some(key) = values.keys().find(|key| names_no_child(key)) {
        let err = SyncError::InvalidKey { key: key.clone() };
        return rejected(&node, err);
    }
    debug!(node = %node, keys = values.len(), "update issued");
    let store = node.store();
    let (deferred, done) = settle_with(&node, OperationKind::Update);
    store.merge_children(node.path(), values, done);
    deferred
}

fn names_no_child(key: &str) -> bool {
    NodePath::parse(key).is_root()
}

/// The child `key` of `node`; keys that resolve to no path segment are
/// refused rather than read as `node` itself.
fn child_node(node: &NodeRef, key: &str) -> Result<NodeRef, SyncError> {
    if names_no_child(key) {
        return Err(SyncError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(node.child(key))
}

fn rejected(node: &NodeRef, err: SyncError) -> Deferred<NodeRef> {
    warn!(node = %node, error = %err, "write refused");
    Deferred::rejected(node.store().task_queue().clone(), err)
}

/// A deferred plus the backend callback that settles it with `node`.
fn settle_with(node: &NodeRef, kind: OperationKind) -> (Deferred<NodeRef>, WriteCallback) {
    let deferred = Deferred::new(node.store().task_queue().clone());
    let settle = deferred.clone();
    let resolved = node.clone();
    let done: WriteCallback = Box::new(move |result| match result {
        Ok(()) => {
            settle.resolve(resolved);
        }
        Err(err) => {
            warn!(node = %resolved, %kind, error = %err, "write failed");
            settle.reject(err.into());
        }
    });
    (deferred, done)
}
