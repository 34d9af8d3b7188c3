//! Pass manager: schedule construction and the execution engine.
//!
//! The [`PassManager`] owns the schedule (an ordered list of flow-controlled
//! groups), the control-flow plugin registry, and the manager-level option
//! defaults. Each [`run`](PassManager::run) walks the schedule against one
//! artifact with fresh per-run state: the [`PropertySet`], the valid-pass
//! cache, and the execution trace.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{SchedError, SchedResult};
use crate::fence::{FencedArtifact, FencedPropertySet};
use crate::flow::{self, ControllerArgs, ControllerCtor, FlowController, Item};
use crate::pass::{Pass, PassId, PassKind, PassOptions};
use crate::property::PropertySet;

/// One "pass executed" event, in execution order.
///
/// Requires-induced executions appear before their dependents; skipped
/// (still-valid) passes leave no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// Kind of the executed pass.
    pub kind: PassKind,
    /// Identity of the executed pass.
    pub pass: PassId,
}

impl TraceEntry {
    fn new(kind: PassKind, pass: PassId) -> Self {
        Self { kind, pass }
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ran {} pass {}", self.kind, self.pass)
    }
}

/// Options for one `add()` call: option overrides shared by the group, plus
/// at most one control-flow keyword.
///
/// ```
/// use alsvid_sched::GroupOptions;
///
/// let options = GroupOptions::new()
///     .idempotence(false)
///     .do_while(|props| !props.flag("fixed_point"))
///     .max_iterations(50);
/// ```
#[derive(Clone, Default)]
pub struct GroupOptions {
    options: PassOptions,
    control_flow: Vec<String>,
    args: ControllerArgs,
}

impl GroupOptions {
    /// Create empty group options: no overrides, linear execution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `idempotence` for every pass in the group.
    #[must_use]
    pub fn idempotence(mut self, value: bool) -> Self {
        self.options = self.options.idempotence(value);
        self
    }

    /// Override `ignore_requires` for every pass in the group.
    #[must_use]
    pub fn ignore_requires(mut self, value: bool) -> Self {
        self.options = self.options.ignore_requires(value);
        self
    }

    /// Override `ignore_preserves` for every pass in the group.
    #[must_use]
    pub fn ignore_preserves(mut self, value: bool) -> Self {
        self.options = self.options.ignore_preserves(value);
        self
    }

    /// Run the group only if `predicate` holds when the group is reached.
    #[must_use]
    pub fn condition(
        mut self,
        predicate: impl Fn(&PropertySet) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.args.condition = Some(Arc::new(predicate));
        self.control_flow.push(flow::CONDITION.to_owned());
        self
    }

    /// Repeat the group while `predicate` holds, checking after each walk.
    #[must_use]
    pub fn do_while(
        mut self,
        predicate: impl Fn(&PropertySet) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.args.condition = Some(Arc::new(predicate));
        self.control_flow.push(flow::DO_WHILE.to_owned());
        self
    }

    /// Set the predicate argument without selecting a controller.
    ///
    /// For groups routed through [`control_flow`](Self::control_flow) to a
    /// custom plugin that expects a predicate; [`condition`](Self::condition)
    /// and [`do_while`](Self::do_while) set it implicitly.
    #[must_use]
    pub fn predicate(
        mut self,
        predicate: impl Fn(&PropertySet) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.args.condition = Some(Arc::new(predicate));
        self
    }

    /// Bound the number of repetitions for looping controllers.
    #[must_use]
    pub fn max_iterations(mut self, limit: usize) -> Self {
        self.args.max_iterations = Some(limit);
        self
    }

    /// Repetition count, forwarded to fixed-count controllers.
    #[must_use]
    pub fn count(mut self, count: usize) -> Self {
        self.args.count = Some(count);
        self
    }

    /// Route the group through the registered controller named `name`.
    #[must_use]
    pub fn control_flow(mut self, name: impl Into<String>) -> Self {
        self.control_flow.push(name.into());
        self
    }
}

/// One `add()` call's worth of schedule: a controller plus the group-level
/// option overrides that apply to every pass it reaches.
struct ScheduledGroup<A> {
    controller: FlowController<A>,
    options: PassOptions,
}

/// Per-run scratch state, discarded when `run` returns.
struct RunState {
    properties: PropertySet,
    valid: FxHashSet<PassId>,
    resolving: Vec<PassId>,
    trace: Vec<TraceEntry>,
}

impl RunState {
    fn new() -> Self {
        Self {
            properties: PropertySet::new(),
            valid: FxHashSet::default(),
            resolving: Vec::new(),
            trace: Vec::new(),
        }
    }
}

/// Schedules passes and executes them against one artifact at a time.
///
/// The manager is generic over the artifact type `A` and never inspects it:
/// transformation passes take the artifact by value and hand back the next
/// version, analysis passes see it behind a fenced view.
///
/// Scheduling state (the schedule, the plugin registry, manager-level
/// option defaults) persists across runs; execution state (property set,
/// valid-pass cache) is created fresh for each [`run`](Self::run).
pub struct PassManager<A> {
    schedule: Vec<ScheduledGroup<A>>,
    plugins: FxHashMap<String, ControllerCtor<A>>,
    options: PassOptions,
    trace: Vec<TraceEntry>,
}

impl<A: 'static> PassManager<A> {
    /// Create a new empty pass manager with the built-in control-flow
    /// plugins (`condition`, `do_while`) registered.
    pub fn new() -> Self {
        let mut plugins: FxHashMap<String, ControllerCtor<A>> = FxHashMap::default();
        plugins.insert(
            flow::CONDITION.to_owned(),
            Arc::new(flow::build_conditional::<A>) as ControllerCtor<A>,
        );
        plugins.insert(
            flow::DO_WHILE.to_owned(),
            Arc::new(flow::build_do_while::<A>) as ControllerCtor<A>,
        );
        Self {
            schedule: Vec::new(),
            plugins,
            options: PassOptions::default(),
            trace: Vec::new(),
        }
    }

    /// Set the manager-level option defaults (lowest precedence level).
    #[must_use]
    pub fn with_options(mut self, options: PassOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a single pass with default group options.
    pub fn add_pass(&mut self, pass: Pass<A>) {
        self.schedule.push(ScheduledGroup {
            controller: FlowController::Linear {
                body: vec![Item::Pass(pass)],
            },
            options: PassOptions::default(),
        });
    }

    /// Append a group of passes (or nested controllers) to the schedule.
    ///
    /// `options` may carry per-group option overrides and at most one
    /// control-flow keyword; with none, the group runs once, in order.
    ///
    /// # Errors
    ///
    /// [`SchedError::MalformedPassDeclaration`] when more than one
    /// control-flow keyword was supplied, [`SchedError::UnknownPlugin`] when
    /// the keyword does not match a registered controller, or whatever the
    /// selected controller constructor reports about its arguments.
    pub fn add<I>(&mut self, items: I, options: GroupOptions) -> SchedResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Item<A>>,
    {
        let body: Vec<Item<A>> = items.into_iter().map(Into::into).collect();
        let GroupOptions {
            options: group_options,
            control_flow,
            args,
        } = options;

        let controller = match control_flow.as_slice() {
            [] => FlowController::Linear { body },
            [name] => {
                let ctor = self
                    .plugins
                    .get(name)
                    .ok_or_else(|| SchedError::UnknownPlugin { name: name.clone() })?;
                ctor(body, args)?
            }
            names => {
                return Err(SchedError::MalformedPassDeclaration {
                    reason: format!(
                        "a group accepts at most one control-flow keyword, got: {}",
                        names.join(", ")
                    ),
                });
            }
        };

        self.schedule.push(ScheduledGroup {
            controller,
            options: group_options,
        });
        Ok(())
    }

    /// Register (or overwrite) a control-flow plugin under `name`.
    ///
    /// The next `add()` call on this manager can select it.
    pub fn add_control_flow_plugin(&mut self, name: impl Into<String>, ctor: ControllerCtor<A>) {
        self.plugins.insert(name.into(), ctor);
    }

    /// Remove the control-flow plugin registered under `name`.
    ///
    /// # Errors
    ///
    /// [`SchedError::UnknownPlugin`] when nothing is registered under
    /// `name`.
    pub fn remove_control_flow_plugin(&mut self, name: &str) -> SchedResult<()> {
        match self.plugins.remove(name) {
            Some(_) => Ok(()),
            None => Err(SchedError::UnknownPlugin {
                name: name.to_owned(),
            }),
        }
    }

    /// Number of scheduled groups.
    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    /// Check if the manager has no scheduled groups.
    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    /// Execution trace of the most recent run, successful or failed.
    ///
    /// Entries appear in execution order; each renders as
    /// `ran {kind} pass {identity}`.
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Run the schedule against `artifact` and return the final artifact.
    ///
    /// The property set and the valid-pass cache are created for this call
    /// and discarded with it; only the execution trace is retained, for
    /// inspection via [`trace`](Self::trace).
    ///
    /// # Errors
    ///
    /// The first fatal error aborts the run; see
    /// [`SchedError`]. The artifact is consumed either way — callers must
    /// not assume anything about its state after a failure.
    #[instrument(skip(self, artifact))]
    pub fn run(&mut self, artifact: A) -> SchedResult<A> {
        info!(groups = self.schedule.len(), "running pass schedule");

        let mut state = RunState::new();
        let result = self.run_groups(artifact, &mut state);
        self.trace = state.trace;

        match &result {
            Ok(_) => info!(executed = self.trace.len(), "pass schedule completed"),
            Err(error) => debug!(%error, "pass schedule aborted"),
        }
        result
    }

    fn run_groups(&self, mut artifact: A, state: &mut RunState) -> SchedResult<A> {
        for group in &self.schedule {
            artifact = self.run_controller(&group.controller, artifact, state, group.options)?;
        }
        Ok(artifact)
    }

    fn run_controller(
        &self,
        controller: &FlowController<A>,
        mut artifact: A,
        state: &mut RunState,
        group: PassOptions,
    ) -> SchedResult<A> {
        match controller {
            FlowController::Linear { body } => self.run_body(body, artifact, state, group),
            FlowController::Conditional { condition, body } => {
                // The predicate sees the property set as of this moment,
                // not a snapshot from add-time.
                if condition(&state.properties) {
                    self.run_body(body, artifact, state, group)
                } else {
                    debug!("condition controller skipped its body");
                    Ok(artifact)
                }
            }
            FlowController::DoWhile {
                condition,
                max_iterations,
                body,
            } => {
                let mut iterations = 0usize;
                loop {
                    artifact = self.run_body(body, artifact, state, group)?;
                    iterations += 1;
                    if !condition(&state.properties) {
                        debug!(iterations, "do_while controller reached a fixed point");
                        return Ok(artifact);
                    }
                    if iterations >= *max_iterations {
                        return Err(SchedError::IterationLimitExceeded {
                            limit: *max_iterations,
                        });
                    }
                }
            }
            FlowController::Repeat { count, body } => {
                for _ in 0..*count {
                    artifact = self.run_body(body, artifact, state, group)?;
                }
                Ok(artifact)
            }
        }
    }

    fn run_body(
        &self,
        body: &[Item<A>],
        mut artifact: A,
        state: &mut RunState,
        group: PassOptions,
    ) -> SchedResult<A> {
        for item in body {
            artifact = match item {
                Item::Pass(pass) => self.run_pass(pass, artifact, state, group)?,
                Item::Controller(nested) => self.run_controller(nested, artifact, state, group)?,
            };
        }
        Ok(artifact)
    }

    fn run_pass(
        &self,
        pass: &Pass<A>,
        mut artifact: A,
        state: &mut RunState,
        group: PassOptions,
    ) -> SchedResult<A> {
        let id = pass.id();
        let opts = pass
            .options()
            .layered_over(group)
            .layered_over(self.options)
            .resolve();

        // Requires are resolved depth-first, left to right; a required pass
        // may itself have requires. The resolving stack rejects cycles.
        if !opts.ignore_requires {
            let requires = pass.requires();
            if !requires.is_empty() {
                if state.resolving.contains(&id) {
                    return Err(SchedError::MalformedPassDeclaration {
                        reason: format!("cycle in the requires graph at pass {id}"),
                    });
                }
                state.resolving.push(id.clone());
                for required in requires {
                    if !state.valid.contains(&required.id()) {
                        artifact = self.run_pass(&required, artifact, state, group)?;
                    }
                }
                state.resolving.pop();
            }
        }

        // A still-valid idempotent pass is already satisfied. Passes running
        // with ignore_preserves are exempt: they are re-executed every time
        // they are scheduled.
        if opts.idempotence && !opts.ignore_preserves && state.valid.contains(&id) {
            debug!(pass = %id, "skipping still-valid pass");
            return Ok(artifact);
        }

        state.trace.push(TraceEntry::new(pass.kind(), id.clone()));
        debug!("ran {} pass {}", pass.kind(), id);

        match pass {
            Pass::Analysis(analysis) => {
                let view = FencedArtifact::new(&artifact, id.clone());
                analysis.analyze(&view, &mut state.properties)?;
            }
            Pass::Transformation(transformation) => {
                let view = FencedPropertySet::new(&state.properties, id.clone());
                let next = transformation.transform(artifact, &view)?;
                artifact = next.ok_or_else(|| SchedError::MissingResult { pass: id.clone() })?;
            }
        }

        if pass.kind() == PassKind::Transformation && !opts.ignore_preserves {
            let preserved = pass.preserves();
            state.valid.retain(|entry| preserved.contains(entry));
        }
        if opts.idempotence {
            state.valid.insert(id);
        }
        Ok(artifact)
    }
}

impl<A: 'static> Default for PassManager<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `manager`'s schedule over `artifact` and hand back the result.
///
/// Top-level entry point for one compilation: logs a timed summary around
/// [`PassManager::run`] and surfaces the first fatal error unchanged.
#[instrument(skip_all)]
pub fn compile<A: 'static>(artifact: A, manager: &mut PassManager<A>) -> SchedResult<A> {
    let started = Instant::now();
    let result = manager.run(artifact);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => info!(elapsed_ms, "compilation finished"),
        Err(error) => info!(elapsed_ms, %error, "compilation failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedError;
    use crate::pass::TransformationPass;

    struct Touch;

    impl TransformationPass<u32> for Touch {
        fn id(&self) -> PassId {
            PassId::new("touch")
        }

        fn transform(
            &self,
            artifact: u32,
            _properties: &FencedPropertySet<'_>,
        ) -> SchedResult<Option<u32>> {
            Ok(Some(artifact + 1))
        }
    }

    #[test]
    fn test_empty_manager_returns_artifact_unchanged() {
        let mut manager: PassManager<u32> = PassManager::new();
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);

        let artifact = manager.run(17).unwrap();
        assert_eq!(artifact, 17);
        assert!(manager.trace().is_empty());
    }

    #[test]
    fn test_compile_delegates_to_run() {
        let mut manager = PassManager::new();
        manager.add_pass(Pass::transformation(Touch));

        let artifact = compile(0u32, &mut manager).unwrap();
        assert_eq!(artifact, 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_two_control_flow_keywords_rejected() {
        let mut manager: PassManager<u32> = PassManager::new();
        let err = manager
            .add(
                [Pass::transformation(Touch)],
                GroupOptions::new()
                    .condition(|_| true)
                    .do_while(|_| false),
            )
            .unwrap_err();
        assert!(matches!(err, SchedError::MalformedPassDeclaration { .. }));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_unknown_control_flow_keyword_rejected() {
        let mut manager: PassManager<u32> = PassManager::new();
        let err = manager
            .add(
                [Pass::transformation(Touch)],
                GroupOptions::new().control_flow("do_thrice"),
            )
            .unwrap_err();
        assert_eq!(
            err,
            SchedError::UnknownPlugin {
                name: "do_thrice".to_owned(),
            }
        );
    }

    #[test]
    fn test_trace_entry_display() {
        let entry = TraceEntry::new(PassKind::Transformation, PassId::new("touch"));
        assert_eq!(entry.to_string(), "ran transformation pass touch");
    }

    #[test]
    fn test_trace_serializes_to_json() {
        let entry = TraceEntry::new(
            PassKind::Analysis,
            PassId::configured("count_ops", "kind=cx"),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "analysis", "pass": "count_ops(kind=cx)"})
        );
    }
}
