//! In-memory store for tests and embedding.

use crate::config::StoreConfig;
use crate::diff::diff_children;
use crate::error::{StoreError, StoreResult};
use crate::event::{
    ChildEvent, ChildListener, OperationKind, ReadCallback, SubscriptionId, TransactionCallback,
    TransactionFn, TransactionOutcome, TransactionUpdate, ValueEvent, ValueListener, WriteCallback,
};
use crate::node::NodeRef;
use crate::path::NodePath;
use crate::push_key::PushKeyGenerator;
use crate::query::{ordered_children, query_view, QuerySpec};
use crate::scheduler::TaskQueue;
use crate::store::RemoteStore;
use crate::value::{get_at, normalize, set_at};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// An in-memory [`RemoteStore`].
///
/// Every operation is applied on a later turn of the store's
/// [`TaskQueue`]; listeners are notified and completions invoked on that
/// same turn. Nothing happens until the queue is flushed.
///
/// Failure injection and contention simulation make it suitable for
/// exercising error paths:
///
/// ```rust
/// use std::sync::Arc;
/// use livetree_store::{MemoryStore, OperationKind, RemoteStore, StoreConfig, TaskQueue};
/// use serde_json::json;
///
/// let queue = TaskQueue::new();
/// let store = Arc::new(MemoryStore::new(StoreConfig::default(), queue.clone()));
/// store.fail_next(OperationKind::Set, "setfail");
///
/// let root = store.root();
/// store.write(root.path(), json!(1), OperationKind::Set, Box::new(|result| {
///     assert_eq!(result.unwrap_err().reason(), "setfail");
/// }));
/// queue.flush();
/// ```
pub struct MemoryStore {
    config: StoreConfig,
    queue: TaskQueue,
    keys: PushKeyGenerator,
    shared: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    data: Value,
    failures: HashMap<OperationKind, String>,
    contention: u32,
    last_key: Option<String>,
    next_subscription: u64,
    child_subscriptions: BTreeMap<SubscriptionId, ChildSubscription>,
    value_subscriptions: BTreeMap<SubscriptionId, ValueSubscription>,
    closed: bool,
}

struct ChildSubscription {
    path: NodePath,
    query: Option<QuerySpec>,
    listener: ChildListener,
    ready: bool,
}

struct ValueSubscription {
    path: NodePath,
    query: Option<QuerySpec>,
    listener: ValueListener,
    ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationShape {
    Replace,
    Merge,
}

enum Delivery {
    Child(SubscriptionId, ChildListener, Vec<ChildEvent>),
    Value(SubscriptionId, ValueListener, ValueEvent),
}

impl StoreState {
    fn check(&mut self, kind: OperationKind) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        match self.failures.remove(&kind) {
            Some(reason) => Err(StoreError::rejected(reason)),
            None => Ok(()),
        }
    }

    fn next_id(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        SubscriptionId::new(self.next_subscription)
    }

    /// Events owed to subscribers after a mutation at `changed`.
    fn deliveries(&self, before: &Value, changed: &NodePath, shape: MutationShape) -> Vec<Delivery> {
        let mut deliveries = Vec::new();

        for (id, sub) in &self.child_subscriptions {
            if !sub.ready || !changed.overlaps(&sub.path) {
                continue;
            }
            let old = ordered_children(&get_at(before, sub.path.segments()), sub.query.as_ref());
            let new = ordered_children(&get_at(&self.data, sub.path.segments()), sub.query.as_ref());
            let events = diff_children(&old, &new);
            if !events.is_empty() {
                deliveries.push(Delivery::Child(*id, Arc::clone(&sub.listener), events));
            }
        }

        for (id, sub) in &self.value_subscriptions {
            if !sub.ready || !changed.overlaps(&sub.path) {
                continue;
            }
            let old = query_view(&get_at(before, sub.path.segments()), sub.query.as_ref());
            let new = query_view(&get_at(&self.data, sub.path.segments()), sub.query.as_ref());
            if old == new {
                continue;
            }
            let below = changed.depth() > sub.path.depth()
                || (shape == MutationShape::Merge && *changed == sub.path);
            let merge = if below && sub.query.is_none() {
                child_merge(&old, &new)
            } else {
                None
            };
            let event = match merge {
                Some(merge) => ValueEvent::ChildMerge(merge),
                None => ValueEvent::Snapshot(new),
            };
            deliveries.push(Delivery::Value(*id, Arc::clone(&sub.listener), event));
        }

        deliveries
    }
}

/// Top-level keys that differ between two object-or-null values.
fn child_merge(old: &Value, new: &Value) -> Option<Map<String, Value>> {
    let empty = Map::new();
    let old_map = match old {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return None,
    };
    let new_map = match new {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return None,
    };

    let mut merge = Map::new();
    for (key, value) in new_map {
        if old_map.get(key) != Some(value) {
            merge.insert(key.clone(), value.clone());
        }
    }
    for key in old_map.keys() {
        if !new_map.contains_key(key) {
            merge.insert(key.clone(), Value::Null);
        }
    }
    Some(merge)
}

fn apply<F>(
    shared: &Mutex<StoreState>,
    kind: OperationKind,
    changed: &NodePath,
    shape: MutationShape,
    mutate: F,
) -> StoreResult<()>
where
    F: FnOnce(&mut Value),
{
    let deliveries = {
        let mut state = shared.lock();
        state.check(kind)?;
        let before = state.data.clone();
        mutate(&mut state.data);
        state.deliveries(&before, changed, shape)
    };
    trace!(path = %changed, %kind, deliveries = deliveries.len(), "mutation applied");
    dispatch(shared, deliveries);
    Ok(())
}

fn dispatch(shared: &Mutex<StoreState>, deliveries: Vec<Delivery>) {
    for delivery in deliveries {
        match delivery {
            Delivery::Child(id, listener, events) => {
                for event in events {
                    let active = shared.lock().child_subscriptions.contains_key(&id);
                    if !active {
                        break;
                    }
                    listener(event);
                }
            }
            Delivery::Value(id, listener, event) => {
                let active = shared.lock().value_subscriptions.contains_key(&id);
                if active {
                    listener(event);
                }
            }
        }
    }
}

fn transact(
    shared: &Mutex<StoreState>,
    path: &NodePath,
    mut update: TransactionFn,
    max_attempts: u32,
) -> StoreResult<TransactionOutcome> {
    shared.lock().check(OperationKind::Transaction)?;

    let mut attempts = 0;
    loop {
        if attempts >= max_attempts {
            return Err(StoreError::TooManyRetries { attempts });
        }
        attempts += 1;

        let current = {
            let state = shared.lock();
            if state.closed {
                return Err(StoreError::Closed);
            }
            get_at(&state.data, path.segments())
        };

        let proposed = match update(&current) {
            TransactionUpdate::Abort => {
                return Ok(TransactionOutcome {
                    committed: false,
                    value: current,
                })
            }
            TransactionUpdate::Commit(value) => value,
        };

        let (deliveries, committed) = {
            let mut state = shared.lock();
            if state.contention > 0 {
                state.contention -= 1;
                trace!(path = %path, attempt = attempts, "transaction conflict, retrying");
                continue;
            }
            if get_at(&state.data, path.segments()) != current {
                continue;
            }
            let before = state.data.clone();
            set_at(&mut state.data, path.segments(), proposed);
            let committed = get_at(&state.data, path.segments());
            (
                state.deliveries(&before, path, MutationShape::Replace),
                committed,
            )
        };

        debug!(path = %path, attempts, "transaction committed");
        dispatch(shared, deliveries);
        return Ok(TransactionOutcome {
            committed: true,
            value: committed,
        });
    }
}

fn deliver_initial_children(shared: &Mutex<StoreState>, id: SubscriptionId) {
    let (listener, children) = {
        let mut guard = shared.lock();
        let state = &mut *guard;
        let Some(sub) = state.child_subscriptions.get_mut(&id) else {
            return;
        };
        sub.ready = true;
        let children =
            ordered_children(&get_at(&state.data, sub.path.segments()), sub.query.as_ref());
        (Arc::clone(&sub.listener), children)
    };

    let mut prev_key = None;
    for (key, value) in children {
        let active = shared.lock().child_subscriptions.contains_key(&id);
        if !active {
            break;
        }
        let event = ChildEvent::Added {
            key: key.clone(),
            value,
            prev_key: prev_key.take(),
        };
        prev_key = Some(key);
        listener(event);
    }
}

fn deliver_initial_value(shared: &Mutex<StoreState>, id: SubscriptionId) {
    let (listener, value) = {
        let mut guard = shared.lock();
        let state = &mut *guard;
        let Some(sub) = state.value_subscriptions.get_mut(&id) else {
            return;
        };
        sub.ready = true;
        let value = query_view(&get_at(&state.data, sub.path.segments()), sub.query.as_ref());
        (Arc::clone(&sub.listener), value)
    };
    listener(ValueEvent::Snapshot(value));
}

impl MemoryStore {
    /// Creates an empty store whose callbacks run on `queue`.
    pub fn new(config: StoreConfig, queue: TaskQueue) -> Self {
        Self::with_data(config, queue, Value::Null)
    }

    /// Creates a store holding `data`.
    pub fn with_data(config: StoreConfig, queue: TaskQueue, data: Value) -> Self {
        let state = StoreState {
            data: normalize(data),
            ..StoreState::default()
        };
        Self {
            config,
            queue,
            keys: PushKeyGenerator::new(),
            shared: Arc::new(Mutex::new(state)),
        }
    }

    /// Returns a reference to the root node.
    pub fn root(self: &Arc<Self>) -> NodeRef {
        NodeRef::root(Arc::clone(self) as Arc<dyn RemoteStore>)
    }

    /// Returns a reference to the node at `path`.
    pub fn node(self: &Arc<Self>, path: &str) -> NodeRef {
        NodeRef::new(Arc::clone(self) as Arc<dyn RemoteStore>, NodePath::parse(path))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Makes the next operation of `kind` fail with `reason`, without
    /// touching any data.
    pub fn fail_next(&self, kind: OperationKind, reason: impl Into<String>) {
        self.shared.lock().failures.insert(kind, reason.into());
    }

    /// Makes upcoming transactions lose `rounds` commit attempts to a
    /// simulated concurrent writer, so their update functions run again.
    pub fn simulate_contention(&self, rounds: u32) {
        self.shared.lock().contention = rounds;
    }

    /// Returns the most recent key handed out by `generate_child_key`.
    pub fn last_generated_key(&self) -> Option<String> {
        self.shared.lock().last_key.clone()
    }

    /// Returns a copy of the whole tree.
    pub fn data(&self) -> Value {
        self.shared.lock().data.clone()
    }

    /// Returns a copy of the value at `path`.
    pub fn data_at(&self, path: &str) -> Value {
        get_at(&self.shared.lock().data, NodePath::parse(path).segments())
    }

    /// Returns the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        let state = self.shared.lock();
        state.child_subscriptions.len() + state.value_subscriptions.len()
    }

    /// Closes the store: subscriptions are dropped and every pending or
    /// later operation fails with [`StoreError::Closed`].
    pub fn close(&self) {
        let dropped = {
            let mut state = self.shared.lock();
            state.closed = true;
            (
                std::mem::take(&mut state.child_subscriptions),
                std::mem::take(&mut state.value_subscriptions),
            )
        };
        debug!(
            store = %self.config.name,
            subscriptions = dropped.0.len() + dropped.1.len(),
            "store closed"
        );
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl RemoteStore for MemoryStore {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn task_queue(&self) -> &TaskQueue {
        &self.queue
    }

    fn write(&self, path: &NodePath, value: Value, kind: OperationKind, done: WriteCallback) {
        debug!(store = %self.config.name, path = %path, %kind, "write queued");
        let shared = Arc::clone(&self.shared);
        let path = path.clone();
        self.queue.schedule(move || {
            let result = apply(&shared, kind, &path, MutationShape::Replace, |data| {
                set_at(data, path.segments(), value)
            });
            done(result);
        });
    }

    fn merge_children(&self, path: &NodePath, values: Map<String, Value>, done: WriteCallback) {
        debug!(store = %self.config.name, path = %path, keys = values.len(), "merge queued");
        let shared = Arc::clone(&self.shared);
        let path = path.clone();
        self.queue.schedule(move || {
            if let Some(key) = values.keys().find(|key| NodePath::parse(key).is_root()) {
                done(Err(StoreError::rejected(format!("invalid child key {key:?}"))));
                return;
            }
            let result = apply(
                &shared,
                OperationKind::Update,
                &path,
                MutationShape::Merge,
                |data| {
                    for (key, child) in values {
                        set_at(data, path.child(&key).segments(), child);
                    }
                },
            );
            done(result);
        });
    }

    fn generate_child_key(&self) -> String {
        let key = self.keys.next_key();
        self.shared.lock().last_key = Some(key.clone());
        key
    }

    fn run_transaction(&self, path: &NodePath, update: TransactionFn, done: TransactionCallback) {
        debug!(store = %self.config.name, path = %path, "transaction queued");
        let shared = Arc::clone(&self.shared);
        let path = path.clone();
        let max_attempts = self.config.max_transaction_attempts;
        self.queue
            .schedule(move || done(transact(&shared, &path, update, max_attempts)));
    }

    fn read(&self, node: &NodeRef, done: ReadCallback) {
        let shared = Arc::clone(&self.shared);
        let path = node.path().clone();
        let query = node.query().cloned();
        self.queue.schedule(move || {
            let result = {
                let mut state = shared.lock();
                state
                    .check(OperationKind::Read)
                    .map(|()| query_view(&get_at(&state.data, path.segments()), query.as_ref()))
            };
            done(result);
        });
    }

    fn subscribe_child_events(&self, node: &NodeRef, listener: ChildListener) -> SubscriptionId {
        let id = {
            let mut state = self.shared.lock();
            let id = state.next_id();
            state.child_subscriptions.insert(
                id,
                ChildSubscription {
                    path: node.path().clone(),
                    query: node.query().cloned(),
                    listener,
                    ready: false,
                },
            );
            id
        };
        debug!(store = %self.config.name, path = %node.path(), subscription = %id, "child events subscribed");
        let shared = Arc::clone(&self.shared);
        self.queue
            .schedule(move || deliver_initial_children(&shared, id));
        id
    }

    fn subscribe_value_events(&self, node: &NodeRef, listener: ValueListener) -> SubscriptionId {
        let id = {
            let mut state = self.shared.lock();
            let id = state.next_id();
            state.value_subscriptions.insert(
                id,
                ValueSubscription {
                    path: node.path().clone(),
                    query: node.query().cloned(),
                    listener,
                    ready: false,
                },
            );
            id
        };
        debug!(store = %self.config.name, path = %node.path(), subscription = %id, "value events subscribed");
        let shared = Arc::clone(&self.shared);
        self.queue
            .schedule(move || deliver_initial_value(&shared, id));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // Listeners are dropped after the lock is released: dropping one
        // may drop a view, which unsubscribes in turn.
        let (child, value) = {
            let mut state = self.shared.lock();
            (
                state.child_subscriptions.remove(&id),
                state.value_subscriptions.remove(&id),
            )
        };
        let removed = child.is_some() || value.is_some();
        if removed {
            debug!(store = %self.config.name, subscription = %id, "unsubscribed");
        }
        removed
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.config.name)
            .field("subscriptions", &self.subscription_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
