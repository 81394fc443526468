//! # Route Entities
//!
//! A route is a caller-defined value describing one navigable destination.
//! The engine wraps it in a `RouteEntity`: a shared, identity-bearing handle
//! that also carries the stack back-reference and the result channel.
//!
//! ## Capabilities
//!
//! Routes opt into behaviour by returning a `Capabilities` value:
//! - `Redirectable`: the route is replaced by another before insertion
//! - `Guardable`: the route may veto its own pop
//! - `Both`: composition of the two
//!
//! ## Equality
//!
//! `RouteEntity` equality is caller-defined through `Route::same_route`.
//! Routes that do not define it compare by kind plus owning stack.
//! Identity (the same handle) is `RouteEntity::is`.

use crate::result::{Pending, ResultChannel};
use crate::types::{DeeplinkStrategy, EntityId, NavigationError, RouteKind, StackId};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Future returned by a redirect capability.
pub type RedirectFuture<'a, R> = BoxFuture<'a, Result<Redirection<R>, NavigationError>>;

/// Future returned by a guard capability.
pub type GuardFuture<'a> = BoxFuture<'a, Result<bool, NavigationError>>;

// =============================================================================
// ROUTE TRAIT
// =============================================================================

/// A navigable destination.
///
/// Implementors carry arbitrary payload; the engine only looks at the
/// kind, equality, and capabilities.
pub trait Route: Sized + fmt::Debug + Send + Sync + 'static {
    /// Value delivered to whoever pushed the route when it leaves a stack.
    type Output: Clone + fmt::Debug + Send + Sync + 'static;

    /// The type tag. Defaults to the Rust type name.
    fn kind(&self) -> RouteKind {
        RouteKind::of::<Self>()
    }

    /// Caller-defined equality.
    ///
    /// `None` falls back to kind plus owning stack.
    fn same_route(&self, _other: &Self) -> Option<bool> {
        None
    }

    /// Deep-link hint for coordinators.
    fn deeplink_strategy(&self) -> DeeplinkStrategy {
        DeeplinkStrategy::Replace
    }

    /// The capabilities this route declares.
    fn capabilities(&self) -> Capabilities<'_, Self> {
        Capabilities::Plain
    }

    /// URI of the route, for routes a coordinator can link to.
    fn uri(&self) -> Option<String> {
        None
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Replaces a route with another before it enters a stack.
pub trait Redirect<R: Route>: Send + Sync {
    /// Produce the replacement, or `Redirection::Stay` for none.
    fn redirect(&self) -> RedirectFuture<'_, R>;
}

/// Decides whether a route may leave the top of its stack.
pub trait Guard: Send + Sync {
    /// `Ok(false)` vetoes the exit.
    fn may_exit(&self) -> GuardFuture<'_>;
}

/// Outcome of one redirect step.
pub enum Redirection<R: Route> {
    /// Fixed point: the route redirects to itself.
    Stay,
    /// Continue with another entity.
    To(RouteEntity<R>),
}

impl<R: Route> Redirection<R> {
    /// Redirect to a route or an existing entity.
    pub fn to(target: impl Into<RouteEntity<R>>) -> Self {
        Self::To(target.into())
    }
}

impl<R: Route> fmt::Debug for Redirection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stay => f.write_str("Stay"),
            Self::To(target) => f.debug_tuple("To").field(target).finish(),
        }
    }
}

/// The capability set of a route, inspected at resolution time.
pub enum Capabilities<'a, R: Route> {
    /// No redirect, no guard.
    Plain,
    /// Redirect only.
    Redirectable(&'a dyn Redirect<R>),
    /// Guard only.
    Guardable(&'a dyn Guard),
    /// Redirect and guard.
    Both {
        /// The redirect capability.
        redirect: &'a dyn Redirect<R>,
        /// The guard capability.
        guard: &'a dyn Guard,
    },
}

impl<'a, R: Route> Capabilities<'a, R> {
    /// The redirect capability, if declared.
    #[must_use]
    pub fn redirect(&self) -> Option<&'a dyn Redirect<R>> {
        match *self {
            Self::Redirectable(redirect) | Self::Both { redirect, .. } => Some(redirect),
            Self::Plain | Self::Guardable(_) => None,
        }
    }

    /// The guard capability, if declared.
    #[must_use]
    pub fn guard(&self) -> Option<&'a dyn Guard> {
        match *self {
            Self::Guardable(guard) | Self::Both { guard, .. } => Some(guard),
            Self::Plain | Self::Redirectable(_) => None,
        }
    }
}

// =============================================================================
// ROUTE ENTITY
// =============================================================================

struct EntityInner<R: Route> {
    id: EntityId,
    route: R,
    /// Back-reference to the owning stack. Written by stacks only.
    owner: Mutex<Option<StackId>>,
    channel: ResultChannel<R::Output>,
    delivered: Mutex<Option<R::Output>>,
}

/// Shared handle to a route living in (or headed for) a stack.
///
/// Cloning is cheap and keeps identity: clones are the same entity.
pub struct RouteEntity<R: Route> {
    inner: Arc<EntityInner<R>>,
}

impl<R: Route> RouteEntity<R> {
    /// Wrap a route in a fresh, unowned entity.
    pub fn new(route: R) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                id: EntityId::next(),
                route,
                owner: Mutex::new(None),
                channel: ResultChannel::new(),
                delivered: Mutex::new(None),
            }),
        }
    }

    /// The entity's identity.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// The wrapped route.
    #[must_use]
    pub fn route(&self) -> &R {
        &self.inner.route
    }

    /// Shorthand for `route().kind()`.
    #[must_use]
    pub fn kind(&self) -> RouteKind {
        self.inner.route.kind()
    }

    /// Shorthand for `route().deeplink_strategy()`.
    #[must_use]
    pub fn deeplink_strategy(&self) -> DeeplinkStrategy {
        self.inner.route.deeplink_strategy()
    }

    /// The URI of the route, or `UriUnavailable` if it has none.
    pub fn uri(&self) -> Result<String, NavigationError> {
        self.inner
            .route
            .uri()
            .ok_or_else(|| NavigationError::UriUnavailable(self.kind()))
    }

    /// The stack currently owning this entity.
    #[must_use]
    pub fn owner(&self) -> Option<StackId> {
        *self.inner.owner.lock()
    }

    /// Check if some stack owns this entity.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.owner().is_some()
    }

    /// Identity comparison: both handles are the same entity.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Entity equality as seen by stacks and the reconciler.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.equals_with(other, self.owner(), other.owner())
    }

    /// Equality evaluated as if both entities were owned by `stack`.
    ///
    /// Used when matching fresh entities against members of a stack, so
    /// that routes relying on default equality still match by kind.
    pub(crate) fn same_as_in(&self, other: &Self, stack: StackId) -> bool {
        self.equals_with(other, Some(stack), Some(stack))
    }

    fn equals_with(&self, other: &Self, mine: Option<StackId>, theirs: Option<StackId>) -> bool {
        if self.is(other) {
            return true;
        }
        match self.inner.route.same_route(&other.inner.route) {
            Some(equal) => equal,
            None => mine == theirs && self.kind() == other.kind(),
        }
    }

    /// Await the value this entity delivers when it leaves its stack.
    #[must_use]
    pub fn result(&self) -> Pending<R::Output> {
        self.inner.channel.pending()
    }

    /// Check whether the result channel has been fulfilled.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.channel.is_fulfilled()
    }

    /// The last result delivered by a pop.
    #[must_use]
    pub fn delivered_result(&self) -> Option<R::Output> {
        self.inner.delivered.lock().clone()
    }

    // =========================================================================
    // STACK-ONLY MUTATORS
    // =========================================================================

    /// Claim the entity for `stack`; fails with the current owner if taken.
    pub(crate) fn try_attach(&self, stack: StackId) -> Result<(), StackId> {
        let mut owner = self.inner.owner.lock();
        match *owner {
            Some(current) => Err(current),
            None => {
                *owner = Some(stack);
                Ok(())
            }
        }
    }

    /// Claim the entity or report `AlreadyOwned`.
    pub(crate) fn claim(&self, stack: StackId) -> Result<(), NavigationError> {
        self.try_attach(stack)
            .map_err(|owner| NavigationError::AlreadyOwned {
                kind: self.kind(),
                entity: self.id(),
                owner,
            })
    }

    pub(crate) fn detach(&self) {
        *self.inner.owner.lock() = None;
    }

    /// Record and deliver the exit result. Only the first delivery counts.
    pub(crate) fn complete(&self, result: Option<R::Output>) -> bool {
        let fulfilled = self.inner.channel.fulfill(result.clone());
        if fulfilled {
            *self.inner.delivered.lock() = result;
        }
        fulfilled
    }
}

impl<R: Route> Clone for RouteEntity<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Route> From<R> for RouteEntity<R> {
    fn from(route: R) -> Self {
        Self::new(route)
    }
}

impl<R: Route> PartialEq for RouteEntity<R> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<R: Route> fmt::Debug for RouteEntity<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntity")
            .field("id", &self.inner.id)
            .field("route", &self.inner.route)
            .field("owner", &self.owner())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
