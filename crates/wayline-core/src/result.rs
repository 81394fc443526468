//! # Result Channel
//!
//! One-shot delivery of the value a route returns when it leaves a stack.
//!
//! A `ResultChannel` is a set-once slot with any number of waiters:
//! - The first `fulfill` wins; later calls are no-ops and report `false`
//! - Every waiter observes the same value
//! - Dropping the channel unfulfilled wakes all waiters with `None`
//!
//! The slot is a `tokio::sync::watch` value of `Option<Option<T>>`:
//! the outer `Option` is "fulfilled yet", the inner one is the result.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::IntoFuture;
use tokio::sync::watch;

type Slot<T> = Option<Option<T>>;

/// A single-assignment result slot.
pub struct ResultChannel<T> {
    slot: watch::Sender<Slot<T>>,
}

impl<T> ResultChannel<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an unfulfilled channel.
    #[must_use]
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Deliver `value` to every current and future waiter.
    ///
    /// Returns `true` if this call fulfilled the channel, `false` if it
    /// was already fulfilled (the earlier value is kept).
    pub fn fulfill(&self, value: Option<T>) -> bool {
        self.slot.send_if_modified(move |slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        })
    }

    /// Check whether a value has been delivered.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// The delivered value, if any: `None` while pending.
    #[must_use]
    pub fn peek(&self) -> Option<Option<T>> {
        self.slot.borrow().clone()
    }

    /// A handle that resolves once the channel is fulfilled.
    #[must_use]
    pub fn pending(&self) -> Pending<T> {
        Pending {
            rx: self.slot.subscribe(),
        }
    }
}

impl<T> Default for ResultChannel<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ResultChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultChannel")
            .field("slot", &*self.slot.borrow())
            .finish()
    }
}

// =============================================================================
// PENDING
// =============================================================================

/// Awaitable view of a `ResultChannel`.
///
/// Awaiting yields the delivered result; an absent result (`None`) means
/// the route left without one, was discarded, or was dropped unfulfilled.
/// Clones observe the same value.
#[derive(Clone)]
pub struct Pending<T> {
    rx: watch::Receiver<Slot<T>>,
}

impl<T> Pending<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Peek without waiting: `Some(result)` once delivered.
    #[must_use]
    pub fn try_get(&self) -> Option<Option<T>> {
        self.rx.borrow().clone()
    }

    /// Check whether the result has been delivered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the result.
    pub async fn wait(mut self) -> Option<T> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().flatten(),
            // Channel dropped unfulfilled.
            Err(_) => None,
        }
    }
}

impl<T> IntoFuture for Pending<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Option<T>;
    type IntoFuture = BoxFuture<'static, Option<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}

impl<T: fmt::Debug> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("slot", &*self.rx.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
