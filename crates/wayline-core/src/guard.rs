//! # Guard Resolution
//!
//! Asks a route whether it may leave the top of its stack.
//! Routes without the `Guardable` capability always may.

use crate::route::{Route, RouteEntity};
use crate::types::NavigationError;
use tracing::debug;

/// Resolves exit guards.
pub struct GuardResolver;

impl GuardResolver {
    /// `Ok(true)` if the entity may exit, `Ok(false)` if its guard vetoes.
    ///
    /// Guard failures propagate unchanged.
    pub async fn may_exit<R: Route>(entity: &RouteEntity<R>) -> Result<bool, NavigationError> {
        let Some(guard) = entity.route().capabilities().guard() else {
            return Ok(true);
        };
        let allowed = guard.may_exit().await?;
        if !allowed {
            debug!(entity = %entity.id(), kind = %entity.kind(), "exit vetoed by guard");
        }
        Ok(allowed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
