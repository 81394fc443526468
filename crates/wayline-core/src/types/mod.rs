//! # Core Type Definitions
//!
//! This module contains the small value types shared by every part of the
//! navigation engine:
//! - Identities (`EntityId`, `StackId`)
//! - The route type tag (`RouteKind`)
//! - Deep-link handling hint (`DeeplinkStrategy`)
//! - Error types (`NavigationError`)
//!
//! ## Identity Guarantees
//!
//! Identifiers are handed out from process-wide atomic counters.
//! Two live entities or two live stacks never share an identifier.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_STACK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a route entity.
///
/// Every `RouteEntity` gets a fresh id on construction; clones of the
/// handle share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Identity of a stack container (`NavigationStack` or `IndexedStack`).
///
/// This is the value stored in an entity's back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StackId(pub u64);

impl StackId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack#{}", self.0)
    }
}

// =============================================================================
// ROUTE KIND
// =============================================================================

/// The type tag of a route.
///
/// Defaults to the Rust type name of the route; enum routes usually
/// override it per variant so that default equality can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKind(pub Cow<'static, str>);

impl RouteKind {
    /// Create a kind from a name.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The kind derived from a type name.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// Get the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// DEEPLINK STRATEGY
// =============================================================================

/// How a coordinator should apply a route reached through a deep link.
///
/// The engine only carries this hint; it never acts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeeplinkStrategy {
    /// Replace the whole stack with the linked route.
    #[default]
    Replace,
    /// Push the linked route on top of the current stack.
    Push,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the navigation engine.
///
/// - A denied guard is NOT an error; see `PopOutcome::Denied`
/// - A failing operation never leaves a half-committed stack behind,
///   except `replace`, whose pop phase is documented as non-atomic
#[derive(Debug, Error)]
pub enum NavigationError {
    /// A redirect capability failed while resolving.
    #[error("redirect from {kind} failed: {reason}")]
    RedirectFailed {
        /// Kind of the route whose redirect failed.
        kind: RouteKind,
        /// Caller-supplied failure description.
        reason: String,
    },

    /// An exit guard failed while deciding.
    #[error("exit guard on {kind} failed: {reason}")]
    GuardFailed {
        /// Kind of the guarded route.
        kind: RouteKind,
        /// Caller-supplied failure description.
        reason: String,
    },

    /// A redirect chain went past the configured hop limit.
    #[error("redirect chain starting at {origin} exceeded {limit} hops")]
    RedirectLimitExceeded {
        /// Kind of the entity the chain started from.
        origin: RouteKind,
        /// The configured limit.
        limit: usize,
    },

    /// The entity is already owned by a stack.
    #[error("route {kind} ({entity}) is already owned by {owner}")]
    AlreadyOwned {
        /// Kind of the rejected entity.
        kind: RouteKind,
        /// Identity of the rejected entity.
        entity: EntityId,
        /// The stack currently owning it.
        owner: StackId,
    },

    /// The stack was mutated while a declarative sync awaited redirects.
    #[error("{stack} moved from revision {expected} to {found} during sync")]
    StaleSnapshot {
        /// The stack being synced.
        stack: StackId,
        /// Revision the edit script was computed against.
        expected: u64,
        /// Revision found at commit time.
        found: u64,
    },

    /// An edit script does not fit the sequence it is applied to.
    #[error("edit script does not apply: {0}")]
    ScriptMismatch(String),

    /// The route has no URI representation.
    #[error("route {0} has no URI representation")]
    UriUnavailable(RouteKind),

    /// An indexed stack was addressed outside its bounds.
    #[error("index {index} out of range for indexed stack of {len} routes")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of routes in the indexed stack.
        len: usize,
    },

    /// An indexed stack was built without routes.
    #[error("indexed stack needs at least one route")]
    EmptyIndexedStack,

    /// Configuration could not be parsed or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl NavigationError {
    /// Shorthand for `RedirectFailed`.
    pub fn redirect_failed(kind: RouteKind, reason: impl Into<String>) -> Self {
        Self::RedirectFailed {
            kind,
            reason: reason.into(),
        }
    }

    /// Shorthand for `GuardFailed`.
    pub fn guard_failed(kind: RouteKind, reason: impl Into<String>) -> Self {
        Self::GuardFailed {
            kind,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
