//! # wayline-core
//!
//! The navigation-state engine for Wayline.
//!
//! This crate keeps ordered stacks of route entities and mutates them the
//! way a navigation UI needs: imperatively (push, pop, replace, clear,
//! remove) or declaratively, by reconciling a stack against a freshly
//! declared sequence with a minimal edit script.
//!
//! ## Building Blocks
//!
//! - `route`: the `Route` trait, capabilities, and `RouteEntity` handles
//! - `result`: one-shot result channels awaited by whoever pushed a route
//! - `redirect` / `guard`: capability resolution
//! - `stack` / `indexed`: the containers
//! - `reconcile`: Myers shortest edit script over any sequence
//!
//! ## Architectural Constraints
//!
//! - Executor-agnostic: the engine awaits boxed capability futures and
//!   never spawns tasks
//! - Only stacks write an entity's owner back-reference
//! - No URI matching, no persistence, no rendering

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod guard;
pub mod indexed;
pub mod notify;
pub mod reconcile;
pub mod redirect;
pub mod result;
pub mod route;
pub mod stack;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{DeeplinkStrategy, EntityId, NavigationError, RouteKind, StackId};

// =============================================================================
// RE-EXPORTS: Routes and Results
// =============================================================================

pub use result::{Pending, ResultChannel};
pub use route::{
    Capabilities, Guard, GuardFuture, Redirect, RedirectFuture, Redirection, Route, RouteEntity,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use config::StackConfig;
pub use guard::GuardResolver;
pub use indexed::{IndexedStack, SelectOutcome};
pub use notify::{ListenerId, StackChange, StackOperation};
pub use reconcile::{Edit, EditScript, Kept, StackReconciler};
pub use redirect::{RedirectResolver, Resolution};
pub use stack::{NavigationStack, PopOutcome, ReplaceOutcome};
