//! Live single-node records.

use crate::config::BindingConfig;
use crate::deferred::Deferred;
use crate::error::SyncError;
use crate::writable::Writable;
use livetree_store::{NodeRef, Snapshot, SubscriptionId, ValueEvent, ValueListener};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// The cached value of one node, driven by value events.
///
/// The node's key is always reported under the identity field and can
/// never be overwritten by incoming data.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordCache {
    id: String,
    identity_field: String,
    value: Value,
}

impl RecordCache {
    /// Creates an empty cache for the node with key `id`.
    pub fn new(id: impl Into<String>, identity_field: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identity_field: identity_field.into(),
            value: Value::Null,
        }
    }

    /// Applies one event and returns whether the cached value changed.
    ///
    /// A snapshot replaces the value wholesale; a child merge overwrites
    /// only the listed keys, deleting those mapped to `null`.
    pub fn apply(&mut self, event: ValueEvent) -> bool {
        let next = match event {
            ValueEvent::Snapshot(value) => self.strip_identity(value),
            ValueEvent::ChildMerge(merge) => {
                let mut fields = match &self.value {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };
                for (key, child) in merge {
                    if key == self.identity_field {
                        continue;
                    }
                    if child.is_null() {
                        fields.remove(&key);
                    } else {
                        fields.insert(key, child);
                    }
                }
                if fields.is_empty() {
                    Value::Null
                } else {
                    Value::Object(fields)
                }
            }
        };
        if next == self.value {
            return false;
        }
        self.value = next;
        true
    }

    fn strip_identity(&self, value: Value) -> Value {
        match value {
            Value::Object(mut map) => {
                map.remove(&self.identity_field);
                if map.is_empty() {
                    Value::Null
                } else {
                    Value::Object(map)
                }
            }
            other => other,
        }
    }

    /// Returns the node key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the cached node value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the node's children; empty for scalars and absent nodes.
    pub fn fields(&self) -> Map<String, Value> {
        match &self.value {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Returns one field. The identity field yields the node key.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == self.identity_field {
            return Some(Value::String(self.id.clone()));
        }
        self.value.get(field).cloned()
    }

    /// Renders the record with the identity field included. Scalars are
    /// placed under `value_field`.
    pub fn to_json(&self, value_field: &str) -> Value {
        let mut fields = match &self.value {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            scalar => {
                let mut map = Map::new();
                map.insert(value_field.to_string(), scalar.clone());
                map
            }
        };
        fields.insert(self.identity_field.clone(), Value::String(self.id.clone()));
        Value::Object(fields)
    }

    /// Empties the cache.
    pub fn clear(&mut self) {
        self.value = Value::Null;
    }
}

struct RecordState {
    cache: RecordCache,
    subscription: Option<SubscriptionId>,
    destroyed: bool,
}

struct RecordInner {
    node: NodeRef,
    config: BindingConfig,
    state: Arc<Mutex<RecordState>>,
    loaded: Deferred<Snapshot>,
}

impl Drop for RecordInner {
    fn drop(&mut self) {
        release(&self.node, &self.state);
    }
}

fn release(node: &NodeRef, state: &Mutex<RecordState>) {
    let subscription = {
        let mut state = state.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.cache.clear();
        state.subscription.take()
    };
    if let Some(id) = subscription {
        node.store().unsubscribe(id);
        debug!(node = %node, subscription = %id, "live record destroyed");
    }
}

/// A continuously synchronized copy of one node's value.
///
/// Clones share one subscription and cache. The subscription ends on
/// [`destroy`](Self::destroy) or when the last clone is dropped.
#[derive(Clone)]
pub struct LiveRecord {
    inner: Arc<RecordInner>,
}

impl LiveRecord {
    /// Subscribes to `node`'s value events and starts mirroring them.
    pub fn new(node: NodeRef, config: BindingConfig) -> Self {
        let store = Arc::clone(node.store());
        let id = node.key().unwrap_or_default().to_string();
        let state = Arc::new(Mutex::new(RecordState {
            cache: RecordCache::new(id, config.identity_field.clone()),
            subscription: None,
            destroyed: false,
        }));
        let loaded = Deferred::new(store.task_queue().clone());

        let weak: Weak<Mutex<RecordState>> = Arc::downgrade(&state);
        let settle = loaded.clone();
        let loaded_node = node.clone();
        let listener: ValueListener = Arc::new(move |event: ValueEvent| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let value = {
                let mut state = state.lock();
                if state.destroyed {
                    return;
                }
                trace!(node = %loaded_node, "record event");
                state.cache.apply(event);
                state.cache.value().clone()
            };
            // Only the first event settles it.
            settle.resolve(Snapshot::new(loaded_node.clone(), value));
        });
        let subscription = store.subscribe_value_events(&node, listener);
        state.lock().subscription = Some(subscription);
        debug!(node = %node, subscription = %subscription, "live record subscribed");

        Self {
            inner: Arc::new(RecordInner {
                node,
                config,
                state,
                loaded,
            }),
        }
    }

    /// Returns the node this record mirrors.
    pub fn node_ref(&self) -> &NodeRef {
        &self.inner.node
    }

    /// Resolves with the node's snapshot once the first value arrives.
    pub fn loaded(&self) -> Deferred<Snapshot> {
        self.inner.loaded.clone()
    }

    /// Returns the node key.
    pub fn id(&self) -> String {
        self.inner.state.lock().cache.id().to_string()
    }

    /// Returns a copy of the cached value.
    pub fn value(&self) -> Value {
        self.inner.state.lock().cache.value().clone()
    }

    /// Returns a copy of the node's children.
    pub fn fields(&self) -> Map<String, Value> {
        self.inner.state.lock().cache.fields()
    }

    /// Returns one field; the identity field yields the node key.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.state.lock().cache.get(field)
    }

    /// Renders the record with its identity field, through the configured
    /// record mapper if any.
    pub fn to_json(&self) -> Value {
        let (id, rendered) = {
            let state = self.inner.state.lock();
            let rendered = state.cache.to_json(&self.inner.config.value_field);
            (state.cache.id().to_string(), rendered)
        };
        self.inner.config.render(&id, rendered)
    }

    /// Replaces the node's value with `value`, minus the identity field.
    ///
    /// On a query-scoped record only the children the query shows are
    /// written: fields of `value` are merged in, shown fields missing from
    /// `value` are deleted and hidden children are left alone. A
    /// non-object `value` is then rejected with
    /// [`SyncError::QueryReplace`].
    pub fn save(&self, value: Value) -> Deferred<NodeRef> {
        let value = match value {
            Value::Object(mut map) => {
                map.remove(&self.inner.config.identity_field);
                Value::Object(map)
            }
            other => other,
        };
        if !self.inner.node.is_query() {
            return self.set(value);
        }

        let mut changes = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                let node = self.inner.node.unscoped();
                return Deferred::rejected(
                    node.store().task_queue().clone(),
                    SyncError::QueryReplace {
                        node: node.to_string(),
                    },
                );
            }
        };
        for key in self.fields().into_iter().map(|(key, _)| key) {
            changes.entry(key).or_insert(Value::Null);
        }
        self.update(changes)
    }

    /// Stops synchronizing and releases the cache. Idempotent.
    pub fn destroy(&self) {
        release(&self.inner.node, &self.inner.state);
    }

    /// Returns true if both handles share one view.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns true once destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }
}

impl Writable for LiveRecord {
    fn target(&self) -> &NodeRef {
        &self.inner.node
    }
}

impl std::fmt::Debug for LiveRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LiveRecord")
            .field("node", &self.inner.node)
            .field("value", state.cache.value())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}
