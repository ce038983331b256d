//! Deferred results.
//!
//! A [`Deferred`] is the pending outcome of one operation. It settles
//! exactly once; later attempts are ignored. Observers never run inside
//! the call that settles or registers them: they are dispatched as tasks
//! on the [`TaskQueue`] the deferred was created with.

use crate::error::{SyncError, SyncResult};
use livetree_store::TaskQueue;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Settlement state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Resolved,
    /// Settled with an error.
    Rejected,
}

type Observer<T> = Box<dyn FnOnce(SyncResult<T>) + Send>;

enum Slot<T> {
    Pending(Vec<Observer<T>>),
    Settled(SyncResult<T>),
}

/// A pending result that settles once and notifies observers on a later
/// queue turn.
///
/// Clones share the same slot, so one clone can be handed to the backend
/// callback while another is returned to the caller.
pub struct Deferred<T> {
    slot: Arc<Mutex<Slot<T>>>,
    queue: TaskQueue,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            queue: self.queue.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// Creates a pending deferred dispatching on `queue`.
    pub fn new(queue: TaskQueue) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Pending(Vec::new()))),
            queue,
        }
    }

    /// Creates a deferred already resolved with `value`.
    pub fn resolved(queue: TaskQueue, value: T) -> Self {
        let deferred = Self::new(queue);
        deferred.resolve(value);
        deferred
    }

    /// Creates a deferred already rejected with `error`.
    pub fn rejected(queue: TaskQueue, error: SyncError) -> Self {
        let deferred = Self::new(queue);
        deferred.reject(error);
        deferred
    }

    /// Resolves with `value`. Returns false if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Rejects with `error`. Returns false if already settled.
    pub fn reject(&self, error: SyncError) -> bool {
        self.settle(Err(error))
    }

    /// Settles with `outcome`. Returns false if already settled, in which
    /// case the first outcome stands.
    pub fn settle(&self, outcome: SyncResult<T>) -> bool {
        let observers = {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::Settled(_)) {
                return false;
            }
            match std::mem::replace(&mut *slot, Slot::Settled(outcome.clone())) {
                Slot::Pending(observers) => observers,
                Slot::Settled(_) => Vec::new(),
            }
        };
        for observer in observers {
            let outcome = outcome.clone();
            self.queue.schedule(move || observer(outcome));
        }
        true
    }

    /// Registers an observer for the outcome.
    ///
    /// If already settled, the observer is still dispatched on a later
    /// queue turn rather than called here.
    pub fn on_settled(&self, observer: impl FnOnce(SyncResult<T>) + Send + 'static) -> &Self {
        let outcome = {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Pending(observers) => {
                    observers.push(Box::new(observer));
                    return self;
                }
                Slot::Settled(outcome) => outcome.clone(),
            }
        };
        self.queue.schedule(move || observer(outcome));
        self
    }

    /// Registers separate observers for resolution and rejection.
    pub fn then(
        &self,
        on_resolve: impl FnOnce(T) + Send + 'static,
        on_reject: impl FnOnce(SyncError) + Send + 'static,
    ) -> &Self {
        self.on_settled(move |outcome| match outcome {
            Ok(value) => on_resolve(value),
            Err(error) => on_reject(error),
        })
    }

    /// Returns the current state.
    pub fn state(&self) -> DeferredState {
        match &*self.slot.lock() {
            Slot::Pending(_) => DeferredState::Pending,
            Slot::Settled(Ok(_)) => DeferredState::Resolved,
            Slot::Settled(Err(_)) => DeferredState::Rejected,
        }
    }

    /// Returns true while not settled.
    pub fn is_pending(&self) -> bool {
        self.state() == DeferredState::Pending
    }

    /// Returns the outcome, if settled.
    pub fn outcome(&self) -> Option<SyncResult<T>> {
        match &*self.slot.lock() {
            Slot::Pending(_) => None,
            Slot::Settled(outcome) => Some(outcome.clone()),
        }
    }

    /// Returns the resolved value, if resolved.
    pub fn value(&self) -> Option<T> {
        self.outcome().and_then(Result::ok)
    }

    /// Returns the rejection, if rejected.
    pub fn error(&self) -> Option<SyncError> {
        self.outcome().and_then(Result::err)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.lock() {
            Slot::Pending(observers) => format!("Pending({} observers)", observers.len()),
            Slot::Settled(Ok(_)) => "Resolved".to_string(),
            Slot::Settled(Err(err)) => format!("Rejected({err})"),
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetree_store::StoreError;

    fn collect<T: Clone + Send + 'static>(
        deferred: &Deferred<T>,
    ) -> Arc<Mutex<Vec<SyncResult<T>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        deferred.on_settled(move |outcome| sink.lock().push(outcome));
        seen
    }

    #[test]
    fn observers_run_on_next_turn() {
        let queue = TaskQueue::new();
        let deferred = Deferred::new(queue.clone());
        let seen = collect(&deferred);

        assert!(deferred.resolve(5));
        assert!(seen.lock().is_empty());
        assert_eq!(deferred.state(), DeferredState::Resolved);

        queue.flush();
        assert_eq!(*seen.lock(), vec![Ok(5)]);
    }

    #[test]
    fn first_settlement_wins() {
        let queue = TaskQueue::new();
        let deferred = Deferred::new(queue.clone());
        let seen = collect(&deferred);

        assert!(deferred.resolve("first"));
        assert!(!deferred.resolve("second"));
        assert!(!deferred.reject(StoreError::rejected("late").into()));
        queue.flush();

        assert_eq!(*seen.lock(), vec![Ok("first")]);
        assert_eq!(deferred.value(), Some("first"));
        assert_eq!(deferred.error(), None);
    }

    #[test]
    fn late_observer_still_deferred() {
        let queue = TaskQueue::new();
        let deferred: Deferred<u8> =
            Deferred::rejected(queue.clone(), StoreError::rejected("oops").into());
        queue.flush();

        let seen = collect(&deferred);
        assert!(seen.lock().is_empty());
        queue.flush();
        assert_eq!(
            *seen.lock(),
            vec![Err(SyncError::BackendOperationFailed(StoreError::rejected("oops")))]
        );
    }

    #[test]
    fn then_routes_by_outcome() {
        let queue = TaskQueue::new();
        let resolved = Arc::new(Mutex::new(None));
        let rejected = Arc::new(Mutex::new(None));

        let deferred = Deferred::new(queue.clone());
        let (ok, err) = (Arc::clone(&resolved), Arc::clone(&rejected));
        deferred.then(
            move |value: i32| *ok.lock() = Some(value),
            move |error| *err.lock() = Some(error),
        );
        deferred.reject(StoreError::rejected("nope").into());
        queue.flush();

        assert_eq!(*resolved.lock(), None);
        assert_eq!(
            rejected.lock().as_ref().and_then(SyncError::reason).as_deref(),
            Some("nope")
        );
    }

    #[test]
    fn clones_share_state() {
        let queue = TaskQueue::new();
        let deferred = Deferred::new(queue.clone());
        let handle = deferred.clone();
        assert!(deferred.is_pending());
        handle.resolve(1u32);
        assert_eq!(deferred.outcome(), Some(Ok(1)));
        assert!(format!("{deferred:?}").contains("Resolved"));
    }
}
