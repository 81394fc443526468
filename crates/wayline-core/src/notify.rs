//! # Change Notification
//!
//! Listener registry shared by `NavigationStack` and `IndexedStack`.
//!
//! - Listeners run synchronously, after the mutation has committed
//! - No stack lock is held while they run, so they may read the stack
//! - The revision is also published on a `watch` channel for async observers

use crate::route::{Route, RouteEntity};
use crate::types::StackId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// The logical operation that produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackOperation {
    /// `push` appended an entity.
    Push,
    /// `push_or_move_to_top` appended or moved an entity.
    MoveToTop,
    /// `pop` removed the top entity.
    Pop,
    /// `clear` removed everything.
    Clear,
    /// `remove` removed one entity.
    Remove,
    /// `sync`/`apply` committed an edit script.
    Reconcile,
    /// An indexed stack switched its active route.
    Select,
}

/// A committed mutation, as seen by listeners.
pub struct StackChange<R: Route> {
    /// The stack that changed.
    pub stack: StackId,
    /// Revision after the change.
    pub revision: u64,
    /// What happened.
    pub operation: StackOperation,
    /// Snapshot of the routes after the change, bottom first.
    pub routes: Vec<RouteEntity<R>>,
    /// Active index, for indexed stacks.
    pub active: Option<usize>,
}

impl<R: Route> fmt::Debug for StackChange<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackChange")
            .field("stack", &self.stack)
            .field("revision", &self.revision)
            .field("operation", &self.operation)
            .field("routes", &self.routes.len())
            .field("active", &self.active)
            .finish()
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<R> = Arc<dyn Fn(&StackChange<R>) + Send + Sync>;

struct Registry<R: Route> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<R>)>,
}

/// Listener list plus revision channel.
pub(crate) struct Listeners<R: Route> {
    registry: Mutex<Registry<R>>,
    revision: watch::Sender<u64>,
}

impl<R: Route> Listeners<R> {
    pub(crate) fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            registry: Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            }),
            revision,
        }
    }

    pub(crate) fn subscribe(
        &self,
        listener: impl Fn(&StackChange<R>) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut registry = self.registry.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.entries.len();
        registry.entries.retain(|(entry, _)| *entry != id);
        registry.entries.len() != before
    }

    pub(crate) fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Deliver a committed change. Must be called without stack locks held.
    pub(crate) fn notify(&self, change: &StackChange<R>) {
        self.revision.send_replace(change.revision);
        let listeners: Vec<Listener<R>> = self
            .registry
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(change);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
