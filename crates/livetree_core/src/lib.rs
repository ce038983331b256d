//! # livetree core
//!
//! Promise-style writes and live synchronized views over a remote
//! hierarchical store.
//!
//! This crate provides:
//! - [`Binding`], which turns push/set/remove/update/transaction into
//!   backend calls and returns each outcome as a [`Deferred`]
//! - [`Writable`], the write surface shared by bindings and views
//! - [`LiveCollection`], an ordered copy of a node's children kept in
//!   sync with the backend's child events
//! - [`LiveRecord`], a copy of one node's value kept in sync with its
//!   value events
//!
//! ## Scheduling
//!
//! Nothing here blocks or calls back synchronously. Backend completions,
//! event deliveries and deferred observers are tasks on the store's
//! [`livetree_store::TaskQueue`]; they run when the owner flushes it.
//!
//! A write's deferred and the matching change in a live view are
//! independent completions: either may be observed first.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use livetree_core::{Binding, Writable};
//! use livetree_store::{MemoryStore, StoreConfig, TaskQueue};
//! use serde_json::json;
//!
//! let queue = TaskQueue::new();
//! let store = Arc::new(MemoryStore::new(StoreConfig::default(), queue.clone()));
//! let binding = Binding::new(store.node("messages")).unwrap();
//!
//! let messages = binding.to_collection();
//! let pushed = binding.push(json!({"text": "hello"}));
//! queue.flush();
//!
//! let child = pushed.value().unwrap();
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages.key_at(0).as_deref(), child.key());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binding;
mod collection;
mod config;
mod deferred;
mod error;
mod record;
mod writable;

pub use binding::{BindTarget, Binding};
pub use collection::{LiveCollection, OrderedCache, Record};
pub use config::{BindingConfig, RecordMapper};
pub use deferred::{Deferred, DeferredState};
pub use error::{SyncError, SyncResult};
pub use record::{LiveRecord, RecordCache};
pub use writable::Writable;
