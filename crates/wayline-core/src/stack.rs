//! # Navigation Stack
//!
//! An ordered, mutable container of route entities: first element is the
//! bottom (oldest), last element is the top (current screen).
//!
//! ## Invariants
//!
//! - Every member's back-reference points at this stack
//! - An entity belongs to at most one stack; claiming an owned entity
//!   fails with `NavigationError::AlreadyOwned`
//! - Every committed mutation bumps the revision and notifies once
//! - Every path that removes a member fulfils its result channel
//!
//! ## Concurrency
//!
//! Operations that await redirects or guards commit only after the await.
//! No lock is held across an await, so two overlapping operations on the
//! same stack commit in completion order, not call order. Callers wanting
//! call order must serialise them.

use crate::config::StackConfig;
use crate::guard::GuardResolver;
use crate::notify::{ListenerId, Listeners, StackChange, StackOperation};
use crate::reconcile::{Edit, EditScript, StackReconciler};
use crate::redirect::{RedirectResolver, Resolution};
use crate::result::Pending;
use crate::route::{Route, RouteEntity};
use crate::types::{NavigationError, StackId};
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, warn};

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of a `pop`.
#[derive(Debug)]
pub enum PopOutcome<R: Route> {
    /// The top entity was removed.
    Popped(RouteEntity<R>),
    /// The top entity's guard vetoed the exit; nothing changed.
    Denied,
    /// The stack was empty.
    Empty,
    /// The inspected top left the stack while its guard was pending.
    Detached,
    /// Another entity was pushed over the inspected top while its guard
    /// was pending; nothing changed.
    Superseded,
}

impl<R: Route> PopOutcome<R> {
    /// True if an entity was removed.
    #[must_use]
    pub fn is_popped(&self) -> bool {
        matches!(self, Self::Popped(_))
    }
}

/// Result of a `replace`.
#[derive(Debug)]
pub enum ReplaceOutcome<R: Route> {
    /// Every old entity left and every new one was pushed.
    Replaced(Vec<Pending<R::Output>>),
    /// A guard vetoed the pop phase; no new entity was pushed.
    Blocked {
        /// Entities still on the stack.
        remaining: usize,
    },
}

// =============================================================================
// NAVIGATION STACK
// =============================================================================

struct State<R: Route> {
    entries: Vec<RouteEntity<R>>,
    revision: u64,
}

/// Ordered stack of route entities with listener notification.
pub struct NavigationStack<R: Route> {
    id: StackId,
    config: StackConfig,
    state: Mutex<State<R>>,
    listeners: Listeners<R>,
}

impl<R: Route> NavigationStack<R> {
    /// Create an empty stack with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StackConfig::default())
    }

    /// Create an empty stack with an explicit configuration.
    #[must_use]
    pub fn with_config(config: StackConfig) -> Self {
        let id = StackId::next();
        debug!(stack = %id, label = config.label.as_deref().unwrap_or(""), "stack created");
        Self {
            id,
            config,
            state: Mutex::new(State {
                entries: Vec::new(),
                revision: 0,
            }),
            listeners: Listeners::new(),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// The stack's identity, as stored in member back-references.
    #[must_use]
    pub fn id(&self) -> StackId {
        self.id
    }

    /// The configuration this stack was built with.
    #[must_use]
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Snapshot of the members, bottom first.
    #[must_use]
    pub fn current_sequence(&self) -> Vec<RouteEntity<R>> {
        self.state.lock().entries.clone()
    }

    /// The top entity.
    #[must_use]
    pub fn top(&self) -> Option<RouteEntity<R>> {
        self.state.lock().entries.last().cloned()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True when the stack holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Check membership by identity or equality.
    #[must_use]
    pub fn contains(&self, entity: &RouteEntity<R>) -> bool {
        self.state
            .lock()
            .entries
            .iter()
            .any(|member| member.is(entity) || member.same_as_in(entity, self.id))
    }

    /// Number of committed mutations so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    // =========================================================================
    // OBSERVERS
    // =========================================================================

    /// Register a listener called after every committed mutation.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StackChange<R>) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Revision stream for async observers.
    #[must_use]
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.listeners.watch()
    }

    // =========================================================================
    // IMPERATIVE OPERATIONS
    // =========================================================================

    /// Resolve redirects, then append the target.
    ///
    /// Returns the target's pending result: it completes with the value
    /// passed to the pop that eventually removes the target.
    pub async fn push(
        &self,
        route: impl Into<RouteEntity<R>>,
    ) -> Result<Pending<R::Output>, NavigationError> {
        let resolution = RedirectResolver::resolve(route.into(), self.config.max_redirects).await?;

        let committed = {
            let mut state = self.state.lock();
            let target = resolution.target();
            target.claim(self.id).map(|()| {
                state.entries.push(target.clone());
                self.commit(&mut state, StackOperation::Push)
            })
        };
        let change = match committed {
            Ok(change) => change,
            Err(err) => {
                warn!(
                    stack = %self.id,
                    entity = %resolution.target().id(),
                    error = %err,
                    "push rejected"
                );
                resolution.abandon();
                return Err(err);
            }
        };

        let target = resolution.settle();
        debug!(
            stack = %self.id,
            entity = %target.id(),
            kind = %target.kind(),
            revision = change.revision,
            "push committed"
        );
        self.listeners.notify(&change);
        Ok(target.result())
    }

    /// Resolve redirects, then move an equal member to the top or append.
    ///
    /// A member that is equal but not identical to the target is replaced
    /// by the target and its result channel is fulfilled with `None`.
    pub async fn push_or_move_to_top(
        &self,
        route: impl Into<RouteEntity<R>>,
    ) -> Result<(), NavigationError> {
        let resolution = RedirectResolver::resolve(route.into(), self.config.max_redirects).await?;

        let committed = {
            let mut state = self.state.lock();
            let target = resolution.target();
            let index = state
                .entries
                .iter()
                .position(|member| member.is(target))
                .or_else(|| {
                    state
                        .entries
                        .iter()
                        .position(|member| member.same_as_in(target, self.id))
                });
            let moving_member = index.is_some_and(|i| state.entries[i].is(target));
            let claimed = if moving_member {
                Ok(())
            } else {
                target.claim(self.id)
            };

            claimed.map(|()| {
                let displaced = index.and_then(|i| {
                    let previous = state.entries.remove(i);
                    if moving_member {
                        None
                    } else {
                        previous.detach();
                        Some(previous)
                    }
                });
                state.entries.push(target.clone());
                (self.commit(&mut state, StackOperation::MoveToTop), displaced)
            })
        };
        let (change, displaced) = match committed {
            Ok(committed) => committed,
            Err(err) => {
                warn!(
                    stack = %self.id,
                    entity = %resolution.target().id(),
                    error = %err,
                    "move to top rejected"
                );
                resolution.abandon();
                return Err(err);
            }
        };

        let target = resolution.settle();
        if let Some(previous) = displaced {
            previous.complete(None);
        }
        debug!(
            stack = %self.id,
            entity = %target.id(),
            kind = %target.kind(),
            revision = change.revision,
            "move to top committed"
        );
        self.listeners.notify(&change);
        Ok(())
    }

    /// Remove the top entity if its guard allows, delivering `result`.
    ///
    /// A veto leaves the stack untouched and notifies nobody. So does a top
    /// that is no longer on top once its guard has answered.
    pub async fn pop(&self, result: Option<R::Output>) -> Result<PopOutcome<R>, NavigationError> {
        let Some(top) = self.top() else {
            return Ok(PopOutcome::Empty);
        };

        if !GuardResolver::may_exit(&top).await? {
            return Ok(PopOutcome::Denied);
        }

        let change = {
            let mut state = self.state.lock();
            if !state.entries.last().is_some_and(|last| last.is(&top)) {
                if is_member(&state.entries, &top) {
                    debug!(stack = %self.id, entity = %top.id(), "top covered during its guard");
                    return Ok(PopOutcome::Superseded);
                }
                debug!(stack = %self.id, entity = %top.id(), "top left the stack during its guard");
                return Ok(PopOutcome::Detached);
            }
            state.entries.pop();
            top.detach();
            self.commit(&mut state, StackOperation::Pop)
        };

        top.complete(result);
        debug!(
            stack = %self.id,
            entity = %top.id(),
            kind = %top.kind(),
            revision = change.revision,
            "pop committed"
        );
        self.listeners.notify(&change);
        Ok(PopOutcome::Popped(top))
    }

    /// Remove every member without consulting guards. One notification.
    ///
    /// Result channels are fulfilled with `None` unless the configuration
    /// disables `fulfill_on_clear`. Returns the number of removed members.
    pub fn clear(&self) -> usize {
        let (change, removed) = {
            let mut state = self.state.lock();
            let removed = std::mem::take(&mut state.entries);
            for entity in &removed {
                entity.detach();
            }
            (self.commit(&mut state, StackOperation::Clear), removed)
        };

        if self.config.fulfill_on_clear {
            for entity in &removed {
                entity.complete(None);
            }
        }
        debug!(
            stack = %self.id,
            removed = removed.len(),
            revision = change.revision,
            "clear committed"
        );
        self.listeners.notify(&change);
        removed.len()
    }

    /// Pop everything (guards honoured), then push `routes` in order.
    ///
    /// Not atomic: a vetoed pop stops the operation with the stack in
    /// whatever state the earlier pops left it, and nothing is pushed.
    pub async fn replace<I>(&self, routes: I) -> Result<ReplaceOutcome<R>, NavigationError>
    where
        I: IntoIterator,
        I::Item: Into<RouteEntity<R>>,
    {
        let incoming: Vec<RouteEntity<R>> = routes.into_iter().map(Into::into).collect();

        loop {
            match self.pop(None).await? {
                PopOutcome::Empty => break,
                PopOutcome::Denied => {
                    let remaining = self.len();
                    debug!(stack = %self.id, remaining, "replace blocked by guard");
                    return Ok(ReplaceOutcome::Blocked { remaining });
                }
                PopOutcome::Popped(_) | PopOutcome::Detached | PopOutcome::Superseded => {}
            }
        }

        let mut pending = Vec::with_capacity(incoming.len());
        for entity in incoming {
            pending.push(self.push(entity).await?);
        }
        Ok(ReplaceOutcome::Replaced(pending))
    }

    /// Remove a member at any position without consulting its guard.
    ///
    /// Matches by identity first, then by equality. Returns false if no
    /// member matched.
    pub fn remove(&self, entity: &RouteEntity<R>) -> bool {
        let (change, removed) = {
            let mut state = self.state.lock();
            let index = state
                .entries
                .iter()
                .position(|member| member.is(entity))
                .or_else(|| {
                    state
                        .entries
                        .iter()
                        .position(|member| member.same_as_in(entity, self.id))
                });
            let Some(index) = index else {
                return false;
            };
            let removed = state.entries.remove(index);
            removed.detach();
            (self.commit(&mut state, StackOperation::Remove), removed)
        };

        removed.complete(None);
        debug!(
            stack = %self.id,
            entity = %removed.id(),
            kind = %removed.kind(),
            revision = change.revision,
            "remove committed"
        );
        self.listeners.notify(&change);
        true
    }

    // =========================================================================
    // DECLARATIVE OPERATIONS
    // =========================================================================

    /// Reconcile the stack against a freshly declared sequence.
    ///
    /// Declared routes are resolved through their redirects first, so a
    /// route that redirects matches the member it redirected to. Only the
    /// minimal set of members is then removed or inserted, equality being
    /// evaluated as if the resolved routes already belonged to this stack.
    /// Inserted routes equal to members removed by the same script reuse
    /// those members. Declared entities that already are members are not
    /// resolved again. Returns the script that was committed.
    pub async fn sync<I>(&self, next: I) -> Result<EditScript<RouteEntity<R>>, NavigationError>
    where
        I: IntoIterator,
        I::Item: Into<RouteEntity<R>>,
    {
        let declared: Vec<RouteEntity<R>> = next.into_iter().map(Into::into).collect();
        let (previous, revision) = {
            let state = self.state.lock();
            (state.entries.clone(), state.revision)
        };

        let mut resolutions: Vec<Resolution<R>> = Vec::with_capacity(declared.len());
        for entity in declared {
            if is_member(&previous, &entity) {
                resolutions.push(Resolution::unchanged(entity));
                continue;
            }
            match RedirectResolver::resolve(entity, self.config.max_redirects).await {
                Ok(resolution) => resolutions.push(resolution),
                Err(err) => {
                    resolutions.into_iter().for_each(Resolution::abandon);
                    return Err(err);
                }
            }
        }
        let targets: Vec<RouteEntity<R>> = resolutions
            .iter()
            .map(|resolution| resolution.target().clone())
            .collect();

        let script = StackReconciler::diff_by(&previous, &targets, |member, declared| {
            member.same_as_in(declared, self.id)
        });
        if script.is_empty() {
            for resolution in resolutions {
                resolution.settle();
            }
            return Ok(script);
        }

        let kept = script.kept().to_vec();
        let mut spare: Vec<RouteEntity<R>> = script.removals().cloned().collect();
        let edits = script
            .into_edits()
            .into_iter()
            .map(|edit| match edit {
                Edit::Remove { .. } => edit,
                Edit::Insert { index, item } => {
                    let reuse = spare
                        .iter()
                        .position(|member| member.is(&item))
                        .or_else(|| {
                            spare
                                .iter()
                                .position(|member| member.same_as_in(&item, self.id))
                        });
                    match reuse {
                        Some(at) => Edit::Insert {
                            index,
                            item: spare.remove(at),
                        },
                        None => Edit::Insert { index, item },
                    }
                }
            })
            .collect();

        match self.commit_script(EditScript::from_parts(edits, kept), Some(revision)) {
            Ok(script) => {
                for resolution in resolutions {
                    resolution.settle();
                }
                Ok(script)
            }
            Err(err) => {
                resolutions.into_iter().for_each(Resolution::abandon);
                Err(err)
            }
        }
    }

    /// Commit a precomputed edit script of entities.
    ///
    /// No redirects are resolved. Removals must name the members at the
    /// given positions (by identity); insertions must be unowned, or be
    /// members removed earlier in the same script.
    pub fn apply(&self, script: EditScript<RouteEntity<R>>) -> Result<(), NavigationError> {
        if script.is_empty() {
            return Ok(());
        }
        self.commit_script(script, None).map(|_| ())
    }

    fn commit_script(
        &self,
        script: EditScript<RouteEntity<R>>,
        expected_revision: Option<u64>,
    ) -> Result<EditScript<RouteEntity<R>>, NavigationError> {
        let (change, released) = {
            let mut state = self.state.lock();
            if let Some(expected) = expected_revision
                && state.revision != expected
            {
                warn!(
                    stack = %self.id,
                    expected,
                    found = state.revision,
                    "stack changed while sync awaited redirects"
                );
                return Err(NavigationError::StaleSnapshot {
                    stack: self.id,
                    expected,
                    found: state.revision,
                });
            }

            // Validate everything on a working copy before touching ownership.
            let mut working = state.entries.clone();
            let mut removed: Vec<RouteEntity<R>> = Vec::new();
            for edit in script.edits() {
                match edit {
                    Edit::Remove { index, item } => {
                        if working.get(*index).is_none_or(|member| !member.is(item)) {
                            return Err(NavigationError::ScriptMismatch(format!(
                                "{} is not at position {}",
                                item.id(),
                                index
                            )));
                        }
                        removed.push(working.remove(*index));
                    }
                    Edit::Insert { index, item } => {
                        if *index > working.len() {
                            return Err(NavigationError::ScriptMismatch(format!(
                                "insert at {} on sequence of {}",
                                index,
                                working.len()
                            )));
                        }
                        if working.iter().any(|member| member.is(item)) {
                            return Err(NavigationError::ScriptMismatch(format!(
                                "{} inserted twice",
                                item.id()
                            )));
                        }
                        let recycled = removed.iter().any(|member| member.is(item));
                        if !recycled && let Some(owner) = item.owner() {
                            return Err(NavigationError::AlreadyOwned {
                                kind: item.kind(),
                                entity: item.id(),
                                owner,
                            });
                        }
                        working.insert(*index, item.clone());
                    }
                }
            }

            let released: Vec<RouteEntity<R>> = removed
                .into_iter()
                .filter(|member| !working.iter().any(|kept| kept.is(member)))
                .collect();
            let mut claimed: Vec<&RouteEntity<R>> = Vec::new();
            for inserted in script.insertions() {
                if is_member(&state.entries, inserted) {
                    continue;
                }
                if let Err(err) = inserted.claim(self.id) {
                    for entity in claimed {
                        entity.detach();
                    }
                    return Err(err);
                }
                claimed.push(inserted);
            }
            for member in &released {
                member.detach();
            }
            state.entries = working;
            (self.commit(&mut state, StackOperation::Reconcile), released)
        };

        for member in &released {
            member.complete(None);
        }
        debug!(
            stack = %self.id,
            edits = script.len(),
            released = released.len(),
            revision = change.revision,
            "edit script committed"
        );
        self.listeners.notify(&change);
        Ok(script)
    }

    /// Bump the revision and build the change record. Caller notifies
    /// after releasing the lock.
    fn commit(&self, state: &mut State<R>, operation: StackOperation) -> StackChange<R> {
        state.revision += 1;
        StackChange {
            stack: self.id,
            revision: state.revision,
            operation,
            routes: state.entries.clone(),
            active: None,
        }
    }
}

/// Identity membership test.
fn is_member<R: Route>(entries: &[RouteEntity<R>], entity: &RouteEntity<R>) -> bool {
    entries.iter().any(|member| member.is(entity))
}

impl<R: Route> Drop for NavigationStack<R> {
    /// Members leave the dropped stack as if it were cleared, minus the
    /// notification.
    fn drop(&mut self) {
        let released = std::mem::take(&mut self.state.get_mut().entries);
        if released.is_empty() {
            return;
        }
        for entity in &released {
            entity.detach();
            if self.config.fulfill_on_clear {
                entity.complete(None);
            }
        }
        debug!(stack = %self.id, released = released.len(), "stack dropped");
    }
}

impl<R: Route> Default for NavigationStack<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Route> fmt::Debug for NavigationStack<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NavigationStack")
            .field("id", &self.id)
            .field("label", &self.config.label)
            .field("revision", &state.revision)
            .field("entries", &state.entries)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
