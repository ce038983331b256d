//! Shared fixtures for integration tests.

#![allow(dead_code)]

use livetree_store::{MemoryStore, NodeRef, StoreConfig, TaskQueue};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the test writer; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Default tree the tests start from.
pub fn default_data() -> Value {
    json!({
        "a": {"aString": "alpha", "aNumber": 1, "aBoolean": false},
        "b": {"aString": "bravo", "aNumber": 2, "aBoolean": true},
        "c": {"aString": "charlie", "aNumber": 3, "aBoolean": true},
        "d": {"aString": "delta", "aNumber": 4, "aBoolean": true},
        "e": {"aString": "echo", "aNumber": 5},
        "data": {"a": 1, "b": 2, "c": 3},
        "index": {"b": true, "c": 1}
    })
}

/// A store, its queue and helpers.
pub struct Harness {
    pub queue: TaskQueue,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_data(default_data())
    }

    pub fn empty() -> Self {
        Self::with_data(Value::Null)
    }

    pub fn with_data(data: Value) -> Self {
        init_tracing();
        let queue = TaskQueue::new();
        let store = Arc::new(MemoryStore::with_data(
            StoreConfig::new().name("mock"),
            queue.clone(),
            data,
        ));
        Self { queue, store }
    }

    pub fn root(&self) -> NodeRef {
        self.store.root()
    }

    pub fn node(&self, path: &str) -> NodeRef {
        self.store.node(path)
    }

    /// Runs every queued backend operation, event and observer.
    pub fn flush(&self) -> usize {
        self.queue.flush()
    }
}

/// Converts a JSON object literal into a field map.
pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Records every value it is called with.
#[derive(Clone)]
pub struct Spy<T> {
    calls: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Spy<T> {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sink(&self) -> impl FnOnce(T) + Send + 'static {
        let calls = Arc::clone(&self.calls);
        move |value| calls.lock().push(value)
    }

    pub fn calls(&self) -> Vec<T> {
        self.calls.lock().clone()
    }

    pub fn called(&self) -> bool {
        !self.calls.lock().is_empty()
    }

    pub fn first(&self) -> T {
        self.calls.lock()[0].clone()
    }
}
