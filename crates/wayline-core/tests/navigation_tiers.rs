//! # Navigation Tier Tests (N0-N3)
//!
//! End-to-end behaviour of the engine through its public API.
//!
//! ## Tiers
//! - N0: Imperative stack scenarios
//! - N1: Redirect resolution
//! - N2: Reconciliation
//! - N3: Concurrent operations
//! - N4: Failure propagation

use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;
use wayline_core::{
    Capabilities, Edit, Guard, GuardFuture, NavigationError, NavigationStack, PopOutcome, Redirect,
    RedirectFuture, Redirection, ReplaceOutcome, Route, RouteEntity, RouteKind, StackConfig,
    StackOperation, StackReconciler,
};

// =============================================================================
// FIXTURES
// =============================================================================

#[derive(Debug)]
enum Page {
    Named(&'static str),
    Login,
    /// Redirects to `Login` on its first redirect call only.
    Protected(Arc<AtomicUsize>),
    /// Exit allowed while the flag is set.
    Guarded(&'static str, Arc<AtomicBool>),
    /// Redirect waits for the gate, then stays.
    Gated(Arc<Notify>),
    /// Redirects to itself through the same handle.
    SelfRef(Mutex<Option<RouteEntity<Page>>>),
    /// Redirects to the given handle.
    Forward(RouteEntity<Page>),
    Loop,
    /// Redirect fails.
    Broken,
    /// Guard waits for the gate, then allows.
    Held(Arc<Notify>),
    /// Guard fails.
    Faulty,
}

impl Route for Page {
    type Output = String;

    fn kind(&self) -> RouteKind {
        RouteKind::new(match self {
            Page::Named(name) | Page::Guarded(name, _) => *name,
            Page::Login => "login",
            Page::Protected(_) => "protected",
            Page::Gated(_) => "gated",
            Page::SelfRef(_) => "self-ref",
            Page::Forward(_) => "forward",
            Page::Loop => "loop",
            Page::Broken => "broken",
            Page::Held(_) => "held",
            Page::Faulty => "faulty",
        })
    }

    fn same_route(&self, other: &Self) -> Option<bool> {
        Some(self.kind() == other.kind())
    }

    fn capabilities(&self) -> Capabilities<'_, Self> {
        match self {
            Page::Named(_) | Page::Login => Capabilities::Plain,
            Page::Guarded(..) | Page::Held(_) | Page::Faulty => Capabilities::Guardable(self),
            _ => Capabilities::Redirectable(self),
        }
    }
}

impl Redirect<Page> for Page {
    fn redirect(&self) -> RedirectFuture<'_, Page> {
        async move {
            match self {
                Page::Protected(calls) => {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok(Redirection::to(Page::Login))
                    } else {
                        Ok(Redirection::Stay)
                    }
                }
                Page::Gated(gate) => {
                    gate.notified().await;
                    Ok(Redirection::Stay)
                }
                Page::SelfRef(handle) => match handle.lock().clone() {
                    Some(me) => Ok(Redirection::To(me)),
                    None => Ok(Redirection::Stay),
                },
                Page::Forward(target) => Ok(Redirection::To(target.clone())),
                Page::Loop => Ok(Redirection::to(Page::Loop)),
                Page::Broken => Err(NavigationError::redirect_failed(
                    self.kind(),
                    "session lookup failed",
                )),
                _ => Ok(Redirection::Stay),
            }
        }
        .boxed()
    }
}

impl Guard for Page {
    fn may_exit(&self) -> GuardFuture<'_> {
        async move {
            match self {
                Page::Guarded(_, allow) => Ok(allow.load(Ordering::SeqCst)),
                Page::Held(gate) => {
                    gate.notified().await;
                    Ok(true)
                }
                Page::Faulty => Err(NavigationError::guard_failed(
                    self.kind(),
                    "prompt crashed",
                )),
                _ => Ok(true),
            }
        }
        .boxed()
    }
}

fn names(stack: &NavigationStack<Page>) -> Vec<String> {
    stack
        .current_sequence()
        .iter()
        .map(|entity| entity.kind().as_str().to_string())
        .collect()
}

/// Count the notifications a stack sends from now on.
fn count_changes(stack: &NavigationStack<Page>) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    stack.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    count
}

// =============================================================================
// TIER N0: IMPERATIVE STACK SCENARIOS
// =============================================================================

mod n0_imperative {
    use super::*;

    /// N0.1: Pop delivers its result to the pusher and empties the stack.
    #[tokio::test]
    async fn push_then_pop_delivers_result() {
        let stack = NavigationStack::<Page>::new();
        let pending = stack.push(Page::Named("a")).await.expect("push");

        let outcome = stack.pop(Some("ok".to_string())).await.expect("pop");

        assert!(outcome.is_popped());
        assert_eq!(pending.await.as_deref(), Some("ok"));
        assert!(stack.is_empty());
    }

    /// N0.2: Move-to-top does not duplicate.
    #[tokio::test]
    async fn push_or_move_to_top_moves_existing() {
        let stack = NavigationStack::<Page>::new();
        let a = RouteEntity::new(Page::Named("a"));
        stack.push(a.clone()).await.expect("push a");
        stack.push(Page::Named("b")).await.expect("push b");

        stack.push_or_move_to_top(a.clone()).await.expect("move a");

        assert_eq!(names(&stack), ["b", "a"]);
        assert!(stack.top().expect("top").is(&a));
    }

    /// N0.3: A denied pop aborts replace before any push.
    #[tokio::test]
    async fn replace_aborts_on_guard_denial() {
        let stack = NavigationStack::<Page>::new();
        let allow = Arc::new(AtomicBool::new(false));
        stack
            .push(Page::Guarded("a", Arc::clone(&allow)))
            .await
            .expect("push");

        let outcome = stack
            .replace([Page::Named("x"), Page::Named("y")])
            .await
            .expect("replace");

        assert!(matches!(outcome, ReplaceOutcome::Blocked { remaining: 1 }));
        assert_eq!(names(&stack), ["a"]);
    }

    /// N0.4: Clear empties the stack with one notification and detaches all.
    #[tokio::test]
    async fn clear_notifies_once_and_detaches() {
        let stack = NavigationStack::<Page>::new();
        let entities: Vec<RouteEntity<Page>> = ["a", "b", "c"]
            .into_iter()
            .map(|name| RouteEntity::new(Page::Named(name)))
            .collect();
        for entity in &entities {
            stack.push(entity.clone()).await.expect("push");
        }

        let operations = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&operations);
        stack.subscribe(move |change| sink.lock().push(change.operation));

        assert_eq!(stack.clear(), 3);
        assert!(stack.is_empty());
        assert_eq!(*operations.lock(), [StackOperation::Clear]);
        for entity in &entities {
            assert!(!entity.is_owned());
            assert_eq!(entity.result().try_get(), Some(None));
        }
    }

    /// N0.5: An entity lives in one stack at a time.
    #[tokio::test]
    async fn entity_moves_between_stacks_only_after_leaving() {
        let first = NavigationStack::<Page>::new();
        let second = NavigationStack::<Page>::new();
        let a = RouteEntity::new(Page::Named("a"));

        first.push(a.clone()).await.expect("push");
        assert!(matches!(
            second.push(a.clone()).await,
            Err(NavigationError::AlreadyOwned { .. })
        ));

        first.pop(None).await.expect("pop");
        second.push(a.clone()).await.expect("push elsewhere");
        assert_eq!(a.owner(), Some(second.id()));
    }

    /// N0.6: Remove reaches below the top without consulting guards.
    #[tokio::test]
    async fn remove_skips_guards() {
        let stack = NavigationStack::<Page>::new();
        stack
            .push(Page::Guarded("a", Arc::new(AtomicBool::new(false))))
            .await
            .expect("push");
        stack.push(Page::Named("b")).await.expect("push");

        assert!(stack.remove(&RouteEntity::new(Page::Named("a"))));
        assert_eq!(names(&stack), ["b"]);
    }
}

// =============================================================================
// TIER N1: REDIRECT RESOLUTION
// =============================================================================

mod n1_redirects {
    use super::*;

    /// N1.1: A first-call redirect puts the login route on top.
    #[tokio::test]
    async fn protected_route_lands_on_login() {
        let stack = NavigationStack::<Page>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        stack
            .push(Page::Protected(Arc::clone(&calls)))
            .await
            .expect("push");

        assert_eq!(names(&stack), ["login"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// N1.2: A route redirecting to its own handle is pushed as-is.
    #[tokio::test]
    async fn self_redirect_is_a_fixed_point() {
        let stack = NavigationStack::<Page>::new();
        let entity = RouteEntity::new(Page::SelfRef(Mutex::new(None)));
        if let Page::SelfRef(handle) = entity.route() {
            *handle.lock() = Some(entity.clone());
        }

        stack.push(entity.clone()).await.expect("push");

        assert!(stack.top().expect("top").is(&entity));
        // Break the reference cycle.
        if let Page::SelfRef(handle) = entity.route() {
            handle.lock().take();
        }
    }

    /// N1.3: A configured hop limit turns a runaway chain into an error.
    #[tokio::test]
    async fn runaway_chain_is_bounded_by_config() {
        let stack =
            NavigationStack::<Page>::with_config(StackConfig::default().with_max_redirects(8));
        let err = stack.push(Page::Loop).await.expect_err("limit");

        assert!(matches!(
            err,
            NavigationError::RedirectLimitExceeded { limit: 8, .. }
        ));
        assert!(stack.is_empty());
        assert_eq!(stack.revision(), 0);
    }

    /// N1.4: A redirect target owned elsewhere fails the push and leaves
    /// the origin pending until a later push succeeds.
    #[tokio::test]
    async fn rejected_target_keeps_origin_pending() {
        let other = NavigationStack::<Page>::new();
        let taken = RouteEntity::new(Page::Named("taken"));
        other.push(taken.clone()).await.expect("push elsewhere");

        let stack = NavigationStack::<Page>::new();
        let origin = RouteEntity::new(Page::Forward(taken.clone()));

        let err = stack.push(origin.clone()).await.expect_err("owned");
        assert!(matches!(err, NavigationError::AlreadyOwned { .. }));
        let err = stack
            .push_or_move_to_top(origin.clone())
            .await
            .expect_err("owned");
        assert!(matches!(err, NavigationError::AlreadyOwned { .. }));
        assert!(!origin.is_completed());
        assert!(stack.is_empty());
        assert_eq!(taken.owner(), Some(other.id()));

        other.clear();
        stack.push(origin.clone()).await.expect("push after release");
        assert!(stack.top().expect("top").is(&taken));
        assert_eq!(origin.result().try_get(), Some(None));
    }
}

// =============================================================================
// TIER N2: RECONCILIATION
// =============================================================================

mod n2_reconcile {
    use super::*;

    /// N2.1: ABC to ACD removes B and inserts D after C.
    #[test]
    fn diff_keeps_common_elements() {
        let script = StackReconciler::diff(&['A', 'B', 'C'], &['A', 'C', 'D']);

        assert_eq!(
            script.edits(),
            [
                Edit::Remove {
                    index: 1,
                    item: 'B'
                },
                Edit::Insert {
                    index: 2,
                    item: 'D'
                },
            ]
        );
        assert_eq!(script.kept().len(), 2);
    }

    /// N2.2: Sync preserves the instances of kept routes.
    #[tokio::test]
    async fn sync_preserves_instances() {
        let stack = NavigationStack::<Page>::new();
        let a = RouteEntity::new(Page::Named("a"));
        let c = RouteEntity::new(Page::Named("c"));
        stack.push(a.clone()).await.expect("push");
        stack.push(Page::Named("b")).await.expect("push");
        stack.push(c.clone()).await.expect("push");

        let script = stack
            .sync([Page::Named("a"), Page::Named("c"), Page::Named("d")])
            .await
            .expect("sync");

        assert_eq!(script.removals().count(), 1);
        assert_eq!(script.insertions().count(), 1);
        assert_eq!(names(&stack), ["a", "c", "d"]);
        let members = stack.current_sequence();
        assert!(members[0].is(&a));
        assert!(members[1].is(&c));
    }

    /// N2.3: Reordering recycles the removed instance instead of the copy.
    #[tokio::test]
    async fn sync_reorder_recycles_instances() {
        let stack = NavigationStack::<Page>::new();
        let a = RouteEntity::new(Page::Named("a"));
        let b = RouteEntity::new(Page::Named("b"));
        stack.push(a.clone()).await.expect("push");
        stack.push(b.clone()).await.expect("push");

        stack
            .sync([Page::Named("b"), Page::Named("a")])
            .await
            .expect("sync");

        let members = stack.current_sequence();
        assert_eq!(names(&stack), ["b", "a"]);
        assert!(members.iter().any(|member| member.is(&a)));
        assert!(members.iter().any(|member| member.is(&b)));
        assert!(!a.is_completed());
        assert!(!b.is_completed());
    }

    /// N2.4: Sync notifies once per committed script.
    #[tokio::test]
    async fn sync_notifies_once() {
        let stack = NavigationStack::<Page>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        stack.subscribe(move |change| {
            assert_eq!(change.operation, StackOperation::Reconcile);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        stack
            .sync([Page::Named("a"), Page::Named("b"), Page::Named("c")])
            .await
            .expect("sync");
        stack
            .sync([Page::Named("a"), Page::Named("b"), Page::Named("c")])
            .await
            .expect("no-op sync");

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    /// N2.5: Re-declaring a redirecting route keeps the member it led to.
    #[tokio::test]
    async fn sync_with_redirects_settles() {
        let stack = NavigationStack::<Page>::new();
        let declare = || {
            [
                Page::Named("home"),
                Page::Protected(Arc::new(AtomicUsize::new(0))),
            ]
        };

        stack.sync(declare()).await.expect("sync");
        assert_eq!(names(&stack), ["home", "login"]);
        let login = stack.top().expect("top");
        let count = count_changes(&stack);

        let script = stack.sync(declare()).await.expect("sync again");

        assert!(script.is_empty());
        assert_eq!(stack.revision(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(stack.top().expect("top").is(&login));
        assert!(!login.is_completed());
    }
}

// =============================================================================
// TIER N3: CONCURRENT OPERATIONS
// =============================================================================

mod n3_concurrency {
    use super::*;

    /// N3.1: A pop issued while a push awaits its redirect commits first.
    #[tokio::test]
    async fn completion_order_wins_over_call_order() {
        let stack = NavigationStack::<Page>::new();
        stack.push(Page::Named("a")).await.expect("push");

        let operations = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&operations);
        stack.subscribe(move |change| sink.lock().push(change.operation));

        let gate = Arc::new(Notify::new());
        let (pushed, popped) = tokio::join!(stack.push(Page::Gated(Arc::clone(&gate))), async {
            let outcome = stack.pop(Some("early".into())).await;
            gate.notify_one();
            outcome
        });

        pushed.expect("push");
        assert!(matches!(popped.expect("pop"), PopOutcome::Popped(_)));
        assert_eq!(names(&stack), ["gated"]);
        assert_eq!(
            *operations.lock(),
            [StackOperation::Pop, StackOperation::Push]
        );
    }

    /// N3.2: A sync whose redirects overlap another mutation is rejected.
    #[tokio::test]
    async fn sync_detects_stale_snapshot() {
        let stack = NavigationStack::<Page>::new();
        stack.push(Page::Named("a")).await.expect("push");

        let gate = Arc::new(Notify::new());
        let (synced, pushed) = tokio::join!(
            stack.sync([Page::Named("a"), Page::Gated(Arc::clone(&gate))]),
            async {
                let pushed = stack.push(Page::Named("b")).await;
                gate.notify_one();
                pushed
            }
        );

        pushed.expect("push");
        assert!(matches!(
            synced,
            Err(NavigationError::StaleSnapshot { .. })
        ));
        assert_eq!(names(&stack), ["a", "b"]);
    }

    /// N3.3: Async observers see the latest revision.
    #[tokio::test]
    async fn revision_stream_reports_commits() {
        let stack = NavigationStack::<Page>::new();
        let mut revisions = stack.watch_revision();

        stack.push(Page::Named("a")).await.expect("push");
        stack.push(Page::Named("b")).await.expect("push");

        revisions.changed().await.expect("changed");
        assert_eq!(*revisions.borrow_and_update(), 2);
    }

    /// N3.4: A pop whose top was covered while its guard ran removes nothing.
    #[tokio::test]
    async fn pop_leaves_a_covered_top_alone() {
        let stack = NavigationStack::<Page>::new();
        let gate = Arc::new(Notify::new());
        let held = stack
            .push(Page::Held(Arc::clone(&gate)))
            .await
            .expect("push");

        let (popped, pushed) = tokio::join!(stack.pop(Some("late".into())), async {
            let pushed = stack.push(Page::Named("b")).await;
            gate.notify_one();
            pushed
        });

        let covering = pushed.expect("push");
        assert!(matches!(popped.expect("pop"), PopOutcome::Superseded));
        assert_eq!(names(&stack), ["held", "b"]);
        assert_eq!(stack.revision(), 2);
        assert!(!held.is_complete());
        assert!(!covering.is_complete());
    }
}

// =============================================================================
// TIER N4: FAILURE PROPAGATION
// =============================================================================

mod n4_failures {
    use super::*;

    /// N4.1: A failing guard fails the pop and leaves the stack as it was.
    #[tokio::test]
    async fn guard_failure_fails_pop() {
        let stack = NavigationStack::<Page>::new();
        stack.push(Page::Named("a")).await.expect("push");
        let faulty = stack.push(Page::Faulty).await.expect("push");
        let count = count_changes(&stack);

        let err = stack.pop(Some("x".into())).await.expect_err("guard");

        assert!(matches!(err, NavigationError::GuardFailed { .. }));
        assert_eq!(names(&stack), ["a", "faulty"]);
        assert_eq!(stack.revision(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!faulty.is_complete());
    }

    /// N4.2: A failing guard fails the replace before anything is pushed.
    #[tokio::test]
    async fn guard_failure_fails_replace() {
        let stack = NavigationStack::<Page>::new();
        stack.push(Page::Named("a")).await.expect("push");
        stack.push(Page::Faulty).await.expect("push");
        let count = count_changes(&stack);

        let err = stack
            .replace([Page::Named("x")])
            .await
            .expect_err("guard");

        assert!(matches!(err, NavigationError::GuardFailed { .. }));
        assert_eq!(names(&stack), ["a", "faulty"]);
        assert_eq!(stack.revision(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    /// N4.3: A failing redirect fails the push and keeps its origin pending.
    #[tokio::test]
    async fn redirect_failure_fails_push() {
        let stack = NavigationStack::<Page>::new();
        stack.push(Page::Named("a")).await.expect("push");
        let count = count_changes(&stack);
        let broken = RouteEntity::new(Page::Broken);

        let err = stack.push(broken.clone()).await.expect_err("redirect");

        assert!(matches!(err, NavigationError::RedirectFailed { .. }));
        assert_eq!(names(&stack), ["a"]);
        assert_eq!(stack.revision(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!broken.is_owned());
        assert!(!broken.is_completed());
    }

    /// N4.4: A failing redirect fails the whole sync.
    #[tokio::test]
    async fn redirect_failure_fails_sync() {
        let stack = NavigationStack::<Page>::new();
        stack.push(Page::Named("a")).await.expect("push");
        let count = count_changes(&stack);

        let err = stack
            .sync([Page::Named("a"), Page::Broken, Page::Named("c")])
            .await
            .expect_err("redirect");

        assert!(matches!(err, NavigationError::RedirectFailed { .. }));
        assert_eq!(names(&stack), ["a"]);
        assert_eq!(stack.revision(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
