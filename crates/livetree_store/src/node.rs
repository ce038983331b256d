//! Node references and snapshots.

use crate::path::NodePath;
use crate::query::QuerySpec;
use crate::store::RemoteStore;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A handle to one node of a store, optionally narrowed by a query.
///
/// Two references are equal when they point at the same store instance,
/// the same path and the same query.
#[derive(Clone)]
pub struct NodeRef {
    store: Arc<dyn RemoteStore>,
    path: NodePath,
    query: Option<QuerySpec>,
}

impl NodeRef {
    /// Creates a reference to `path` in `store`.
    pub fn new(store: Arc<dyn RemoteStore>, path: NodePath) -> Self {
        Self {
            store,
            path,
            query: None,
        }
    }

    /// Creates a reference to the root of `store`.
    pub fn root(store: Arc<dyn RemoteStore>) -> Self {
        Self::new(store, NodePath::root())
    }

    /// Returns the store this reference belongs to.
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Returns the path.
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Returns the node key, `None` at the root.
    pub fn key(&self) -> Option<&str> {
        self.path.key()
    }

    /// Returns the query, if this reference is one.
    pub fn query(&self) -> Option<&QuerySpec> {
        self.query.as_ref()
    }

    /// Returns true if this reference is narrowed by a query.
    pub fn is_query(&self) -> bool {
        self.query.is_some()
    }

    /// Returns a reference to a descendant. Children of a query are plain
    /// nodes.
    #[must_use]
    pub fn child(&self, key: &str) -> NodeRef {
        Self::new(Arc::clone(&self.store), self.path.child(key))
    }

    /// Returns the parent node, `None` at the root.
    pub fn parent(&self) -> Option<NodeRef> {
        Some(Self::new(Arc::clone(&self.store), self.path.parent()?))
    }

    /// Returns the same node without its query.
    #[must_use]
    pub fn unscoped(&self) -> NodeRef {
        Self::new(Arc::clone(&self.store), self.path.clone())
    }

    /// Returns the same node narrowed by `query`.
    #[must_use]
    pub fn with_query(&self, query: QuerySpec) -> NodeRef {
        Self {
            store: Arc::clone(&self.store),
            path: self.path.clone(),
            query: Some(query),
        }
    }

    /// Returns true if both references use the same store instance.
    pub fn same_store(&self, other: &NodeRef) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.store) as *const (),
            Arc::as_ptr(&other.store) as *const (),
        )
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_store(other) && self.path == other.path && self.query == other.query
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("store", &self.store.name())
            .field("path", &self.path.to_string())
            .field("query", &self.query)
            .finish()
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.store.name(), self.path)
    }
}

/// The value of a node at some point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// The node the value was read from.
    pub node: NodeRef,
    /// The value; `null` if the node does not exist.
    pub value: Value,
}

impl Snapshot {
    /// Creates a snapshot.
    pub fn new(node: NodeRef, value: Value) -> Self {
        Self { node, value }
    }

    /// Returns the node key.
    pub fn key(&self) -> Option<&str> {
        self.node.key()
    }

    /// Returns true if the node had a value.
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }
}
