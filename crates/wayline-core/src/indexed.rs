//! # Indexed Stack
//!
//! A fixed, non-empty set of routes with one active index: the tab
//! container next to the push/pop `NavigationStack`.
//!
//! The set never changes after construction; only the active index moves.
//! Leaving the active route honours its exit guard.

use crate::guard::GuardResolver;
use crate::notify::{ListenerId, Listeners, StackChange, StackOperation};
use crate::route::{Route, RouteEntity};
use crate::types::{NavigationError, StackId};
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::watch;
use tracing::debug;

/// Result of a `select`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The active index moved.
    Switched {
        /// Index active before the switch.
        from: usize,
        /// Index active after the switch.
        to: usize,
    },
    /// The requested index was already active.
    Unchanged,
    /// The active route's guard vetoed leaving it.
    Denied,
}

struct Selection {
    active: usize,
    revision: u64,
}

/// Tab container: fixed routes, one active.
pub struct IndexedStack<R: Route> {
    id: StackId,
    routes: Vec<RouteEntity<R>>,
    selection: Mutex<Selection>,
    listeners: Listeners<R>,
}

impl<R: Route> IndexedStack<R> {
    /// Build a container owning `routes`, with `active` selected.
    ///
    /// Fails with `EmptyIndexedStack` for an empty set, `IndexOutOfRange`
    /// for a bad initial index, or `AlreadyOwned` if any route already
    /// belongs to a stack. On failure no route stays claimed.
    pub fn new<I>(routes: I, active: usize) -> Result<Self, NavigationError>
    where
        I: IntoIterator,
        I::Item: Into<RouteEntity<R>>,
    {
        let routes: Vec<RouteEntity<R>> = routes.into_iter().map(Into::into).collect();
        if routes.is_empty() {
            return Err(NavigationError::EmptyIndexedStack);
        }
        if active >= routes.len() {
            return Err(NavigationError::IndexOutOfRange {
                index: active,
                len: routes.len(),
            });
        }

        let id = StackId::next();
        for (claimed, entity) in routes.iter().enumerate() {
            if let Err(err) = entity.claim(id) {
                for earlier in &routes[..claimed] {
                    earlier.detach();
                }
                return Err(err);
            }
        }

        debug!(stack = %id, routes = routes.len(), active, "indexed stack created");
        Ok(Self {
            id,
            routes,
            selection: Mutex::new(Selection {
                active,
                revision: 0,
            }),
            listeners: Listeners::new(),
        })
    }

    /// The container's identity.
    #[must_use]
    pub fn id(&self) -> StackId {
        self.id
    }

    /// All routes, in index order.
    #[must_use]
    pub fn routes(&self) -> &[RouteEntity<R>] {
        &self.routes
    }

    /// Number of routes. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Always false; kept for API symmetry with `NavigationStack`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The active index.
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.selection.lock().active
    }

    /// The active route.
    #[must_use]
    pub fn active(&self) -> RouteEntity<R> {
        self.routes[self.active_index()].clone()
    }

    /// Number of committed switches.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.selection.lock().revision
    }

    /// Register a listener called after every committed switch.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StackChange<R>) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    /// Remove a listener.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Revision stream for async observers.
    #[must_use]
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.listeners.watch()
    }

    /// Make `index` active if the current route's guard allows leaving it.
    pub async fn select(&self, index: usize) -> Result<SelectOutcome, NavigationError> {
        if index >= self.routes.len() {
            return Err(NavigationError::IndexOutOfRange {
                index,
                len: self.routes.len(),
            });
        }

        let from = self.active_index();
        if from == index {
            return Ok(SelectOutcome::Unchanged);
        }
        if !GuardResolver::may_exit(&self.routes[from]).await? {
            return Ok(SelectOutcome::Denied);
        }

        let change = {
            let mut selection = self.selection.lock();
            // Another select may have committed while the guard ran.
            if selection.active == index {
                return Ok(SelectOutcome::Unchanged);
            }
            selection.active = index;
            selection.revision += 1;
            StackChange {
                stack: self.id,
                revision: selection.revision,
                operation: StackOperation::Select,
                routes: self.routes.clone(),
                active: Some(index),
            }
        };

        debug!(stack = %self.id, from, to = index, revision = change.revision, "select committed");
        self.listeners.notify(&change);
        Ok(SelectOutcome::Switched { from, to: index })
    }

    /// Select the first route equal to `entity`.
    ///
    /// Fails with `IndexOutOfRange` (index = len) when none matches.
    pub async fn select_route(
        &self,
        entity: &RouteEntity<R>,
    ) -> Result<SelectOutcome, NavigationError> {
        let index = self
            .routes
            .iter()
            .position(|member| member.is(entity) || member.same_as_in(entity, self.id))
            .ok_or(NavigationError::IndexOutOfRange {
                index: self.routes.len(),
                len: self.routes.len(),
            })?;
        self.select(index).await
    }
}

impl<R: Route> Drop for IndexedStack<R> {
    /// Release every route: it is unowned again and its result channel
    /// completes with `None`.
    fn drop(&mut self) {
        for entity in &self.routes {
            entity.detach();
            entity.complete(None);
        }
        debug!(stack = %self.id, released = self.routes.len(), "indexed stack dropped");
    }
}

impl<R: Route> fmt::Debug for IndexedStack<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedStack")
            .field("id", &self.id)
            .field("active", &self.active_index())
            .field("routes", &self.routes)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
