//! # Redirect Resolution
//!
//! Follows a route's redirect chain until it reaches a fixed point.
//!
//! - A route without the `Redirectable` capability is its own target
//! - `Redirection::Stay`, or a redirect to the very same entity, stops the chain
//! - No hop limit unless the stack configuration sets `max_redirects`
//! - Entities the chain moved away from are released (result `None`) only
//!   once the caller settles the resolution, so a failed commit leaves the
//!   origin pending

use crate::route::{Redirection, Route, RouteEntity};
use crate::types::NavigationError;
use std::iter;
use tracing::{trace, warn};

/// A resolved redirect chain.
///
/// Nothing is released until the caller either `settle`s it after
/// committing the target, or `abandon`s it when the operation fails.
#[derive(Debug)]
#[must_use = "a resolution must be settled or abandoned"]
pub struct Resolution<R: Route> {
    origin: RouteEntity<R>,
    target: RouteEntity<R>,
    passed: Vec<RouteEntity<R>>,
}

impl<R: Route> Resolution<R> {
    /// A resolution that did not follow any redirect.
    pub(crate) fn unchanged(entity: RouteEntity<R>) -> Self {
        Self {
            origin: entity.clone(),
            target: entity,
            passed: Vec::new(),
        }
    }

    /// The entity resolution started from.
    #[must_use]
    pub fn origin(&self) -> &RouteEntity<R> {
        &self.origin
    }

    /// The terminal entity of the chain.
    #[must_use]
    pub fn target(&self) -> &RouteEntity<R> {
        &self.target
    }

    /// True if the target differs from the origin.
    #[must_use]
    pub fn redirected(&self) -> bool {
        !self.target.is(&self.origin)
    }

    /// Release every entity the chain moved away from, origin included,
    /// and return the target.
    pub fn settle(self) -> RouteEntity<R> {
        release(&self.passed, &self.target);
        self.target
    }

    /// Release the entities the chain produced, target included, leaving
    /// the origin pending.
    pub fn abandon(self) {
        release(self.passed.iter().chain(iter::once(&self.target)), &self.origin);
    }
}

/// Resolves redirect chains.
pub struct RedirectResolver;

impl RedirectResolver {
    /// Resolve `origin` to its terminal entity.
    ///
    /// On failure the intermediates are released but `origin` is left
    /// pending so the caller may retry. Entities owned by a stack are never
    /// released.
    pub async fn resolve<R: Route>(
        origin: RouteEntity<R>,
        max_redirects: Option<usize>,
    ) -> Result<Resolution<R>, NavigationError> {
        let mut passed: Vec<RouteEntity<R>> = Vec::new();
        let mut current = origin.clone();
        let mut hops = 0usize;

        loop {
            let step = match current.route().capabilities().redirect() {
                Some(redirect) => redirect.redirect().await,
                None => break,
            };

            let candidate = match step {
                Ok(Redirection::Stay) => break,
                Ok(Redirection::To(candidate)) if candidate.is(&current) => break,
                Ok(Redirection::To(candidate)) => candidate,
                Err(err) => {
                    passed.push(current);
                    release(&passed, &origin);
                    return Err(err);
                }
            };

            if let Some(limit) = max_redirects
                && hops >= limit
            {
                warn!(
                    origin = %origin.kind(),
                    limit,
                    "redirect chain exceeded the configured hop limit"
                );
                passed.push(current);
                passed.push(candidate);
                release(&passed, &origin);
                return Err(NavigationError::RedirectLimitExceeded {
                    origin: origin.kind(),
                    limit,
                });
            }

            hops += 1;
            trace!(from = %current.kind(), to = %candidate.kind(), hop = hops, "redirect");
            passed.push(std::mem::replace(&mut current, candidate));
        }

        Ok(Resolution {
            origin,
            target: current,
            passed,
        })
    }
}

/// Fulfil every unowned entity except `keep` with `None`.
fn release<'a, R: Route>(
    entities: impl IntoIterator<Item = &'a RouteEntity<R>>,
    keep: &RouteEntity<R>,
) {
    for entity in entities {
        if entity.is(keep) || entity.is_owned() {
            continue;
        }
        if entity.complete(None) {
            trace!(entity = %entity.id(), kind = %entity.kind(), "released redirect intermediate");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
