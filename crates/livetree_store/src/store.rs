//! The remote store capability.

use crate::event::{
    ChildListener, OperationKind, ReadCallback, SubscriptionId, TransactionCallback,
    TransactionFn, ValueListener, WriteCallback,
};
use crate::node::NodeRef;
use crate::path::NodePath;
use crate::scheduler::TaskQueue;
use serde_json::{Map, Value};

/// A remote hierarchical key-value store.
///
/// This is the whole surface the façade needs from a backend. Wire
/// protocol, transport and authentication live behind it.
///
/// # Invariants
///
/// - Every callback and listener runs on a turn of [`task_queue`],
///   never inside the call that registered it
/// - A new subscription first receives the node's current state
///   (one `Added` per child in order, or one `Snapshot`)
/// - Events of one subscription arrive in emission order
/// - A `read` issued after a subscription on the same node completes
///   after that subscription's initial events
/// - After [`unsubscribe`] returns, the listener is never invoked again
///
/// [`task_queue`]: RemoteStore::task_queue
/// [`unsubscribe`]: RemoteStore::unsubscribe
pub trait RemoteStore: Send + Sync {
    /// Returns a display name for this store.
    fn name(&self) -> &str;

    /// Returns the queue all callbacks of this store run on.
    fn task_queue(&self) -> &TaskQueue;

    /// Replaces the value at `path`. Writing `null` deletes.
    ///
    /// `kind` names the caller-level operation for bookkeeping; it does
    /// not change what is written.
    fn write(&self, path: &NodePath, value: Value, kind: OperationKind, done: WriteCallback);

    /// Replaces each listed child of `path`, leaving others untouched.
    fn merge_children(&self, path: &NodePath, values: Map<String, Value>, done: WriteCallback);

    /// Returns a fresh, chronologically ordered child key.
    fn generate_child_key(&self) -> String;

    /// Runs an atomic read-modify-write at `path`.
    ///
    /// The store may call `update` several times under contention.
    fn run_transaction(&self, path: &NodePath, update: TransactionFn, done: TransactionCallback);

    /// Reads the current value observed by `node` (respecting its query).
    fn read(&self, node: &NodeRef, done: ReadCallback);

    /// Subscribes to child events of `node` (respecting its query).
    fn subscribe_child_events(&self, node: &NodeRef, listener: ChildListener) -> SubscriptionId;

    /// Subscribes to value events of `node` (respecting its query).
    fn subscribe_value_events(&self, node: &NodeRef, listener: ValueListener) -> SubscriptionId;

    /// Cancels a subscription. Returns false if it was not active.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
