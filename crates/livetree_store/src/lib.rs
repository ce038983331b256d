//! # livetree store
//!
//! Backend-facing layer for livetree.
//!
//! This crate provides:
//! - [`NodePath`] and [`NodeRef`], the handle to one node (optionally a
//!   query) of a remote hierarchical store
//! - [`RemoteStore`], the narrow capability a backend implements
//! - [`ChildEvent`] / [`ValueEvent`], the change streams a backend emits
//! - [`TaskQueue`], the explicit cooperative scheduler every completion
//!   and observer runs on
//! - [`MemoryStore`], an in-memory backend for tests and embedding
//!
//! ## Design Principles
//!
//! - Nothing here blocks: operations schedule work and return
//! - All callbacks run on a [`TaskQueue`] turn, never inside the call
//!   that requested them
//! - Draining the queue is an explicit operation ([`TaskQueue::flush`])
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use livetree_store::{MemoryStore, OperationKind, RemoteStore, StoreConfig, TaskQueue};
//! use serde_json::json;
//!
//! let queue = TaskQueue::new();
//! let store = Arc::new(MemoryStore::new(StoreConfig::default(), queue.clone()));
//! let root = store.root();
//!
//! store.write(root.child("greeting").path(), json!("hello"), OperationKind::Set, Box::new(|_| {}));
//! queue.flush();
//! assert_eq!(store.data_at("greeting"), json!("hello"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod diff;
mod error;
mod event;
mod memory;
mod node;
mod path;
mod push_key;
mod query;
mod scheduler;
mod store;
mod value;

pub use config::StoreConfig;
pub use diff::diff_children;
pub use error::{StoreError, StoreResult};
pub use event::{
    ChildEvent, ChildListener, OperationKind, ReadCallback, SubscriptionId, TransactionCallback,
    TransactionFn, TransactionOutcome, TransactionUpdate, ValueEvent, ValueListener, WriteCallback,
};
pub use memory::MemoryStore;
pub use node::{NodeRef, Snapshot};
pub use path::NodePath;
pub use push_key::{PushKeyGenerator, PUSH_CHARS};
pub use query::{ordered_children, query_view, Limit, OrderBy, QuerySpec};
pub use scheduler::{Task, TaskQueue};
pub use store::RemoteStore;
pub use value::{compare_keys, compare_values, get_at, normalize, set_at};
