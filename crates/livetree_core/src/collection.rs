//! Live ordered collections.
//!
//! A [`LiveCollection`] mirrors the ordered children of a node (or
//! query) by replaying the backend's child events into an
//! [`OrderedCache`]. The cache changes only in response to events; the
//! collection's own writes become visible when the backend echoes them.

use crate::config::BindingConfig;
use crate::deferred::Deferred;
use crate::error::SyncError;
use crate::writable::Writable;
use livetree_store::{ChildEvent, ChildListener, NodeRef, SubscriptionId};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// One child of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Child key.
    pub key: String,
    /// Child value.
    pub value: Value,
}

impl Record {
    /// Creates a record.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Renders the record with its key under the identity field.
    ///
    /// Objects get the identity field added; scalars are wrapped as
    /// `{identity: key, value_field: scalar}`. A configured record mapper
    /// then gets the final say.
    pub fn to_json(&self, config: &BindingConfig) -> Value {
        let mut fields = match &self.value {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            scalar => {
                let mut map = Map::new();
                map.insert(config.value_field.clone(), scalar.clone());
                map
            }
        };
        fields.insert(config.identity_field.clone(), Value::String(self.key.clone()));
        config.render(&self.key, Value::Object(fields))
    }
}

/// Key-unique ordered sequence of records driven by child events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedCache {
    records: Vec<Record>,
}

impl OrderedCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event and returns whether the cache changed.
    ///
    /// `Changed`, `Removed` and `Moved` for unknown keys are ignored:
    /// they are expected when a racing write already removed the key.
    /// An `Added` for a key already present repositions it.
    pub fn apply(&mut self, event: ChildEvent) -> bool {
        match event {
            ChildEvent::Added {
                key,
                value,
                prev_key,
            } => {
                if let Some(index) = self.index_of(&key) {
                    self.records.remove(index);
                }
                let at = self.insert_position(prev_key.as_deref());
                self.records.insert(at, Record { key, value });
                true
            }
            ChildEvent::Changed { key, value, .. } => match self.index_of(&key) {
                Some(index) => {
                    self.records[index].value = value;
                    true
                }
                None => ignore("changed", &key),
            },
            ChildEvent::Removed { key } => match self.index_of(&key) {
                Some(index) => {
                    self.records.remove(index);
                    true
                }
                None => ignore("removed", &key),
            },
            ChildEvent::Moved { key, prev_key } => match self.index_of(&key) {
                Some(index) => {
                    let record = self.records.remove(index);
                    let at = self.insert_position(prev_key.as_deref());
                    self.records.insert(at, record);
                    true
                }
                None => ignore("moved", &key),
            },
        }
    }

    /// Position right after `prev_key`, or the front if it is absent.
    fn insert_position(&self, prev_key: Option<&str>) -> usize {
        prev_key
            .and_then(|key| self.index_of(key))
            .map_or(0, |index| index + 1)
    }

    /// Returns the records in order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the record with `key`.
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.key == key)
    }

    /// Returns the position of `key`.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|record| record.key == key)
    }

    /// Returns the key at `index`.
    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.records.get(index).map(|record| record.key.as_str())
    }

    /// Returns the keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.records.iter().map(|record| record.key.clone()).collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

fn ignore(kind: &str, key: &str) -> bool {
    trace!(kind, key, "ignoring event for unknown key");
    false
}

#[derive(Default)]
struct CollectionState {
    cache: OrderedCache,
    subscription: Option<SubscriptionId>,
    destroyed: bool,
}

struct CollectionInner {
    node: NodeRef,
    config: BindingConfig,
    state: Arc<Mutex<CollectionState>>,
    loaded: Deferred<Vec<Record>>,
}

impl Drop for CollectionInner {
    fn drop(&mut self) {
        release(&self.node, &self.state);
    }
}

/// Stops a view: marks it destroyed, clears its cache and cancels its
/// subscription. Safe to call more than once.
fn release(node: &NodeRef, state: &Mutex<CollectionState>) {
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
        debug!(node = %node, subscription = %id, "live collection destroyed");
    }
}

/// An ordered, continuously synchronized copy of a node's children.
///
/// Clones share one subscription and cache. The subscription ends on
/// [`destroy`](Self::destroy) or when the last clone is dropped.
#[derive(Clone)]
pub struct LiveCollection {
    inner: Arc<CollectionInner>,
}

impl LiveCollection {
    /// Subscribes to `node`'s child events and starts mirroring them.
    pub fn new(node: NodeRef, config: BindingConfig) -> Self {
        let store = Arc::clone(node.store());
        let state = Arc::new(Mutex::new(CollectionState::default()));
        let loaded = Deferred::new(store.task_queue().clone());

        let weak: Weak<Mutex<CollectionState>> = Arc::downgrade(&state);
        let listener: ChildListener = Arc::new(move |event: ChildEvent| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = state.lock();
            if state.destroyed {
                return;
            }
            trace!(kind = event.kind(), key = event.key(), "collection event");
            state.cache.apply(event);
        });
        let id = store.subscribe_child_events(&node, listener);
        state.lock().subscription = Some(id);
        debug!(node = %node, subscription = %id, "live collection subscribed");

        // The read completes after the subscription's initial events, so
        // the cache holds the full snapshot when `loaded` resolves.
        let weak = Arc::downgrade(&state);
        let settle = loaded.clone();
        store.read(
            &node,
            Box::new(move |result| match result {
                Ok(_) => {
                    let records = weak
                        .upgrade()
                        .map(|state| state.lock().cache.records().to_vec())
                        .unwrap_or_default();
                    settle.resolve(records);
                }
                Err(err) => {
                    settle.reject(SyncError::from(err));
                }
            }),
        );

        Self {
            inner: Arc::new(CollectionInner {
                node,
                config,
                state,
                loaded,
            }),
        }
    }

    /// Returns the node this collection mirrors.
    pub fn node_ref(&self) -> &NodeRef {
        &self.inner.node
    }

    /// Resolves with the records once the initial snapshot is in.
    pub fn loaded(&self) -> Deferred<Vec<Record>> {
        self.inner.loaded.clone()
    }

    /// Returns a copy of the records in order.
    pub fn records(&self) -> Vec<Record> {
        self.inner.state.lock().cache.records().to_vec()
    }

    /// Returns a copy of the record with `key`.
    pub fn get(&self, key: &str) -> Option<Record> {
        self.inner.state.lock().cache.get(key).cloned()
    }

    /// Returns the position of `key`.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.inner.state.lock().cache.index_of(key)
    }

    /// Returns the key at `index`.
    pub fn key_at(&self, index: usize) -> Option<String> {
        self.inner.state.lock().cache.key_at(index).map(str::to_string)
    }

    /// Returns the keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.state.lock().cache.keys()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.inner.state.lock().cache.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().cache.is_empty()
    }

    /// Renders the records as a JSON array, each with its identity field.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.records()
                .iter()
                .map(|record| record.to_json(&self.inner.config))
                .collect(),
        )
    }

    /// Writes `value` under a new key; same as [`Writable::push`].
    pub fn add(&self, value: Value) -> Deferred<NodeRef> {
        self.push(value)
    }

    /// Writes the cached value of `key` back to the backend.
    ///
    /// Rejects with [`SyncError::UnknownRecord`] if the collection does
    /// not hold `key`.
    pub fn save(&self, key: &str) -> Deferred<NodeRef> {
        match self.get(key) {
            Some(record) => self.set_child(key, record.value),
            None => Deferred::rejected(
                self.inner.node.store().task_queue().clone(),
                SyncError::UnknownRecord {
                    key: key.to_string(),
                },
            ),
        }
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

impl Writable for LiveCollection {
    fn target(&self) -> &NodeRef {
        &self.inner.node
    }
}

impl std::fmt::Debug for LiveCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LiveCollection")
            .field("node", &self.inner.node)
            .field("len", &state.cache.len())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn added(key: &str, value: Value, prev_key: Option<&str>) -> ChildEvent {
        ChildEvent::Added {
            key: key.into(),
            value,
            prev_key: prev_key.map(str::to_string),
        }
    }

    #[test]
    fn add_then_remove_leaves_survivor() {
        let mut cache = OrderedCache::new();
        cache.apply(added("k1", json!("v1"), None));
        cache.apply(added("k2", json!("v2"), Some("k1")));
        cache.apply(ChildEvent::Removed { key: "k1".into() });

        assert_eq!(cache.records(), &[Record::new("k2", json!("v2"))]);
    }

    #[test]
    fn add_with_unknown_prev_goes_first() {
        let mut cache = OrderedCache::new();
        cache.apply(added("a", json!(1), None));
        cache.apply(added("b", json!(2), Some("missing")));
        assert_eq!(cache.keys(), vec!["b", "a"]);
    }

    #[test]
    fn change_keeps_position() {
        let mut cache = OrderedCache::new();
        cache.apply(added("a", json!(1), None));
        cache.apply(added("b", json!(2), Some("a")));
        cache.apply(added("c", json!(3), Some("b")));
        assert!(cache.apply(ChildEvent::Changed {
            key: "b".into(),
            value: json!(20),
            prev_key: Some("a".into()),
        }));
        assert_eq!(cache.keys(), vec!["a", "b", "c"]);
        assert_eq!(cache.get("b").unwrap().value, json!(20));
    }

    #[test]
    fn move_relocates_without_touching_value() {
        let mut cache = OrderedCache::new();
        cache.apply(added("a", json!(1), None));
        cache.apply(added("b", json!(2), Some("a")));
        cache.apply(added("c", json!(3), Some("b")));

        cache.apply(ChildEvent::Moved {
            key: "a".into(),
            prev_key: Some("c".into()),
        });
        assert_eq!(cache.keys(), vec!["b", "c", "a"]);
        assert_eq!(cache.get("a").unwrap().value, json!(1));

        cache.apply(ChildEvent::Moved {
            key: "c".into(),
            prev_key: None,
        });
        assert_eq!(cache.keys(), vec!["c", "b", "a"]);
        assert_eq!(cache.index_of("a"), Some(2));
        assert_eq!(cache.key_at(0), Some("c"));
        assert_eq!(cache.key_at(3), None);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut cache = OrderedCache::new();
        cache.apply(added("a", json!(1), None));
        let before = cache.clone();

        assert!(!cache.apply(ChildEvent::Changed {
            key: "x".into(),
            value: json!(0),
            prev_key: None,
        }));
        assert!(!cache.apply(ChildEvent::Removed { key: "x".into() }));
        assert!(!cache.apply(ChildEvent::Moved {
            key: "x".into(),
            prev_key: None,
        }));
        assert_eq!(cache, before);
    }

    #[test]
    fn duplicate_add_repositions() {
        let mut cache = OrderedCache::new();
        cache.apply(added("a", json!(1), None));
        cache.apply(added("b", json!(2), Some("a")));
        cache.apply(added("a", json!(9), Some("b")));
        assert_eq!(cache.keys(), vec!["b", "a"]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().value, json!(9));
    }

    #[test]
    fn record_json_carries_identity() {
        let config = BindingConfig::default();
        assert_eq!(
            Record::new("k", json!({"name": "ada"})).to_json(&config),
            json!({"$id": "k", "name": "ada"})
        );
        assert_eq!(
            Record::new("k", json!(3)).to_json(&config),
            json!({"$id": "k", "$value": 3})
        );
    }
}
