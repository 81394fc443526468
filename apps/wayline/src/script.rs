//! # Navigation Scripts
//!
//! TOML scripts replayed against a `NavigationStack`.
//!
//! ```toml
//! [config]
//! label = "demo"
//! max_redirects = 4
//!
//! [[routes]]
//! name = "account"
//! redirect = "login"
//!
//! [[routes]]
//! name = "editor"
//! guard = "deny"
//!
//! [[steps]]
//! op = "push"
//! route = "account"
//!
//! [[steps]]
//! op = "pop"
//! result = "done"
//! ```
//!
//! Routes are identified by name. Names missing from the catalog are plain
//! routes with neither redirect nor guard.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use wayline_core::{
    Capabilities, Guard, GuardFuture, NavigationError, NavigationStack, Pending, PopOutcome,
    Redirect, RedirectFuture, Redirection, ReplaceOutcome, Route, RouteEntity, RouteKind,
    StackConfig, StackReconciler,
};

// =============================================================================
// SCRIPT MODEL
// =============================================================================

/// Exit policy of a guarded route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPolicy {
    Allow,
    Deny,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    pub name: String,
    /// Name of the route this one redirects to.
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub guard: Option<GuardPolicy>,
}

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Push { route: String },
    PushOrMoveToTop { route: String },
    Pop {
        #[serde(default)]
        result: Option<String>,
    },
    Remove { route: String },
    Clear,
    Replace { routes: Vec<String> },
    Sync { routes: Vec<String> },
    Diff { from: Vec<String>, to: Vec<String> },
}

impl Step {
    /// The `op` tag of this step.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::PushOrMoveToTop { .. } => "push_or_move_to_top",
            Self::Pop { .. } => "pop",
            Self::Remove { .. } => "remove",
            Self::Clear => "clear",
            Self::Replace { .. } => "replace",
            Self::Sync { .. } => "sync",
            Self::Diff { .. } => "diff",
        }
    }
}

/// A parsed navigation script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Script {
    pub config: StackConfig,
    pub routes: Vec<RouteSpec>,
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, NavigationError> {
        let script: Self = toml::from_str(text)
            .map_err(|e| NavigationError::Config(format!("Invalid script: {}", e)))?;
        script.config.validate()?;

        let mut seen = BTreeMap::new();
        for spec in &script.routes {
            if spec.name.is_empty() {
                return Err(NavigationError::Config(
                    "Route name must not be empty".to_string(),
                ));
            }
            if seen.insert(spec.name.as_str(), ()).is_some() {
                return Err(NavigationError::Config(format!(
                    "Route '{}' declared twice",
                    spec.name
                )));
            }
        }
        Ok(script)
    }

    /// Read and parse a script file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, NavigationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            NavigationError::Io(format!("Cannot read script '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// The route catalog, keyed by name.
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::new(Catalog {
            routes: self
                .routes
                .iter()
                .map(|spec| (spec.name.clone(), spec.clone()))
                .collect(),
        })
    }
}

// =============================================================================
// SCRIPT ROUTES
// =============================================================================

/// Route declarations shared by every `ScriptRoute` of a replay.
#[derive(Debug, Default)]
pub struct Catalog {
    routes: BTreeMap<String, RouteSpec>,
}

impl Catalog {
    /// Instantiate the named route.
    pub fn route(self: &Arc<Self>, name: &str) -> ScriptRoute {
        ScriptRoute {
            name: name.to_string(),
            catalog: Arc::clone(self),
        }
    }

    fn spec(&self, name: &str) -> Option<&RouteSpec> {
        self.routes.get(name)
    }
}

/// A route identified by name, with capabilities from the catalog.
///
/// Two script routes are equal when their names are.
#[derive(Debug)]
pub struct ScriptRoute {
    name: String,
    catalog: Arc<Catalog>,
}

impl ScriptRoute {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Route for ScriptRoute {
    type Output = String;

    fn kind(&self) -> RouteKind {
        RouteKind::new(self.name.clone())
    }

    fn same_route(&self, other: &Self) -> Option<bool> {
        Some(self.name == other.name)
    }

    fn capabilities(&self) -> Capabilities<'_, Self> {
        let Some(spec) = self.catalog.spec(&self.name) else {
            return Capabilities::Plain;
        };
        match (spec.redirect.is_some(), spec.guard.is_some()) {
            (false, false) => Capabilities::Plain,
            (true, false) => Capabilities::Redirectable(self),
            (false, true) => Capabilities::Guardable(self),
            (true, true) => Capabilities::Both {
                redirect: self,
                guard: self,
            },
        }
    }

    fn uri(&self) -> Option<String> {
        Some(format!("/{}", self.name))
    }
}

impl Redirect<ScriptRoute> for ScriptRoute {
    fn redirect(&self) -> RedirectFuture<'_, ScriptRoute> {
        async move {
            let target = self
                .catalog
                .spec(&self.name)
                .and_then(|spec| spec.redirect.as_deref());
            match target {
                Some(target) if target != self.name => {
                    Ok(Redirection::to(self.catalog.route(target)))
                }
                _ => Ok(Redirection::Stay),
            }
        }
        .boxed()
    }
}

impl Guard for ScriptRoute {
    fn may_exit(&self) -> GuardFuture<'_> {
        let policy = self.catalog.spec(&self.name).and_then(|spec| spec.guard);
        async move { Ok(policy != Some(GuardPolicy::Deny)) }.boxed()
    }
}

// =============================================================================
// REPLAY
// =============================================================================

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub outcome: String,
    /// Route names after the step, bottom first.
    pub stack: Vec<String>,
    pub revision: u64,
}

/// Final state of a pushed route's result channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ResultState {
    Delivered(String),
    Discarded,
    Pending,
}

/// Result of one push, as observed at the end of the replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushResult {
    /// Step that pushed the route.
    pub step: usize,
    /// The requested route name.
    pub route: String,
    pub result: ResultState,
}

/// Full replay transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub label: Option<String>,
    pub steps: Vec<StepReport>,
    pub results: Vec<PushResult>,
}

/// Runs scripts against a fresh stack.
pub struct Replayer {
    catalog: Arc<Catalog>,
    stack: NavigationStack<ScriptRoute>,
    pushes: Vec<(usize, String, Pending<String>)>,
}

impl Replayer {
    pub fn new(script: &Script) -> Self {
        Self {
            catalog: script.catalog(),
            stack: NavigationStack::with_config(script.config.clone()),
            pushes: Vec::new(),
        }
    }

    /// The stack the replay runs against.
    pub fn stack(&self) -> &NavigationStack<ScriptRoute> {
        &self.stack
    }

    /// Replay every step of `script`.
    ///
    /// Engine errors are recorded in the step outcome and the replay
    /// continues with the next step.
    pub async fn run(mut self, script: &Script) -> Report {
        let mut steps = Vec::with_capacity(script.steps.len());
        for (index, step) in script.steps.iter().enumerate() {
            let outcome = match self.step(index, step).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(step = index, op = step.op(), error = %e, "step failed");
                    format!("error: {}", e)
                }
            };
            steps.push(StepReport {
                index,
                op: step.op(),
                outcome,
                stack: self.names(),
                revision: self.stack.revision(),
            });
        }

        let results = self
            .pushes
            .into_iter()
            .map(|(step, route, pending)| PushResult {
                step,
                route,
                result: match pending.try_get() {
                    Some(Some(value)) => ResultState::Delivered(value),
                    Some(None) => ResultState::Discarded,
                    None => ResultState::Pending,
                },
            })
            .collect();

        Report {
            label: script.config.label.clone(),
            steps,
            results,
        }
    }

    async fn step(&mut self, index: usize, step: &Step) -> Result<String, NavigationError> {
        match step {
            Step::Push { route } => {
                let pending = self.stack.push(self.catalog.route(route)).await?;
                self.pushes.push((index, route.clone(), pending));
                Ok(format!("top is {}", self.top_name()))
            }
            Step::PushOrMoveToTop { route } => {
                self.stack
                    .push_or_move_to_top(self.catalog.route(route))
                    .await?;
                Ok(format!("top is {}", self.top_name()))
            }
            Step::Pop { result } => Ok(match self.stack.pop(result.clone()).await? {
                PopOutcome::Popped(entity) => format!("popped {}", entity.route().name()),
                PopOutcome::Denied => "denied by guard".to_string(),
                PopOutcome::Empty => "stack empty".to_string(),
                PopOutcome::Detached => "top left during guard".to_string(),
                PopOutcome::Superseded => "top covered during guard".to_string(),
            }),
            Step::Remove { route } => {
                let needle = RouteEntity::new(self.catalog.route(route));
                Ok(if self.stack.remove(&needle) {
                    format!("removed {}", route)
                } else {
                    format!("{} not on stack", route)
                })
            }
            Step::Clear => Ok(format!("cleared {}", self.stack.clear())),
            Step::Replace { routes } => {
                let incoming: Vec<ScriptRoute> =
                    routes.iter().map(|name| self.catalog.route(name)).collect();
                match self.stack.replace(incoming).await? {
                    ReplaceOutcome::Replaced(pending) => {
                        for (name, result) in routes.iter().zip(pending) {
                            self.pushes.push((index, name.clone(), result));
                        }
                        Ok(format!("replaced with {} routes", routes.len()))
                    }
                    ReplaceOutcome::Blocked { remaining } => {
                        Ok(format!("blocked by guard, {} remaining", remaining))
                    }
                }
            }
            Step::Sync { routes } => {
                let next: Vec<ScriptRoute> =
                    routes.iter().map(|name| self.catalog.route(name)).collect();
                let script = self.stack.sync(next).await?;
                Ok(format!(
                    "{} removed, {} inserted",
                    script.removals().count(),
                    script.insertions().count()
                ))
            }
            Step::Diff { from, to } => {
                let script = StackReconciler::diff(from, to);
                Ok(describe_edits(&script))
            }
        }
    }

    fn names(&self) -> Vec<String> {
        self.stack
            .current_sequence()
            .iter()
            .map(|entity| entity.route().name().to_string())
            .collect()
    }

    fn top_name(&self) -> String {
        self.stack
            .top()
            .map(|entity| entity.route().name().to_string())
            .unwrap_or_default()
    }
}

/// One-line rendering of an edit script over names.
pub fn describe_edits(script: &wayline_core::EditScript<String>) -> String {
    if script.is_empty() {
        return "no edits".to_string();
    }
    script
        .edits()
        .iter()
        .map(|edit| match edit {
            wayline_core::Edit::Remove { index, item } => format!("-{}@{}", item, index),
            wayline_core::Edit::Insert { index, item } => format!("+{}@{}", item, index),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replay a script against a fresh stack.
pub async fn replay(script: &Script) -> Report {
    Replayer::new(script).run(script).await
}

// =============================================================================
// TESTS
// =============================================================================
