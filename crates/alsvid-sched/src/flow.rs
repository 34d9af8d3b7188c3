//! Flow controllers: how a scheduled group of passes is walked.
//!
//! Every `add()` call on the [`PassManager`](crate::manager::PassManager)
//! produces one controller. The default is [`FlowController::Linear`]
//! (children once, in order); the other shapes are selected through
//! control-flow keywords resolved against the manager's plugin registry.
//!
//! Controllers compose: any child item may itself be a controller, and each
//! occurrence keeps its own iteration state, so sibling loops never
//! interfere.

use std::fmt;
use std::sync::Arc;

use crate::error::{SchedError, SchedResult};
use crate::pass::Pass;
use crate::property::PropertySet;

/// Registry name of the conditional controller.
pub const CONDITION: &str = "condition";

/// Registry name of the do-while controller.
pub const DO_WHILE: &str = "do_while";

/// Default iteration bound for [`FlowController::DoWhile`].
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Predicate over the live property set.
///
/// Evaluated when the owning controller is reached during a run, not when
/// the schedule is built, so it observes everything earlier passes wrote.
pub type FlowCondition = Arc<dyn Fn(&PropertySet) -> bool + Send + Sync>;

/// One schedulable item: a pass, or a nested controller.
pub enum Item<A> {
    /// A single pass.
    Pass(Pass<A>),
    /// A nested controller with its own walk rule.
    Controller(FlowController<A>),
}

impl<A> From<Pass<A>> for Item<A> {
    fn from(pass: Pass<A>) -> Self {
        Self::Pass(pass)
    }
}

impl<A> From<FlowController<A>> for Item<A> {
    fn from(controller: FlowController<A>) -> Self {
        Self::Controller(controller)
    }
}

/// An ordered, possibly nested group of passes plus the rule for walking it.
///
/// The variant set is closed: new control-flow shapes are added here, in
/// source, and exposed at runtime through the plugin registry
/// ([`PassManager::add_control_flow_plugin`](crate::manager::PassManager::add_control_flow_plugin)).
/// A registered constructor can only ever assemble these variants.
pub enum FlowController<A> {
    /// Children once, in declaration order.
    Linear {
        /// The items to walk.
        body: Vec<Item<A>>,
    },
    /// Children once, iff `condition` holds when the controller is reached.
    Conditional {
        /// Predicate deciding whether the body runs at all.
        condition: FlowCondition,
        /// The items to walk.
        body: Vec<Item<A>>,
    },
    /// Children at least once, repeated while `condition` holds afterwards.
    ///
    /// Exceeding `max_iterations` aborts the run with
    /// [`SchedError::IterationLimitExceeded`].
    DoWhile {
        /// Predicate checked after each full walk of the body.
        condition: FlowCondition,
        /// Hard bound on the number of body repetitions.
        max_iterations: usize,
        /// The items to walk.
        body: Vec<Item<A>>,
    },
    /// Children exactly `count` times.
    ///
    /// Not registered under any name by default; custom control-flow
    /// plugins assemble it for fixed-count repetition.
    Repeat {
        /// Number of body repetitions; zero walks nothing.
        count: usize,
        /// The items to walk.
        body: Vec<Item<A>>,
    },
}

impl<A> FlowController<A> {
    /// A controller that walks `body` once, in order.
    pub fn linear(body: impl IntoIterator<Item = impl Into<Item<A>>>) -> Self {
        Self::Linear {
            body: collect(body),
        }
    }

    /// A controller that walks `body` once if `condition` holds.
    pub fn conditional(
        condition: impl Fn(&PropertySet) -> bool + Send + Sync + 'static,
        body: impl IntoIterator<Item = impl Into<Item<A>>>,
    ) -> Self {
        Self::Conditional {
            condition: Arc::new(condition),
            body: collect(body),
        }
    }

    /// A controller that walks `body` until `condition` turns false, bounded
    /// by [`DEFAULT_MAX_ITERATIONS`].
    pub fn do_while(
        condition: impl Fn(&PropertySet) -> bool + Send + Sync + 'static,
        body: impl IntoIterator<Item = impl Into<Item<A>>>,
    ) -> Self {
        Self::DoWhile {
            condition: Arc::new(condition),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            body: collect(body),
        }
    }

    /// A controller that walks `body` exactly `count` times.
    pub fn repeat(count: usize, body: impl IntoIterator<Item = impl Into<Item<A>>>) -> Self {
        Self::Repeat {
            count,
            body: collect(body),
        }
    }

    /// Variant name, for logs and error context.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear { .. } => "linear",
            Self::Conditional { .. } => "conditional",
            Self::DoWhile { .. } => "do_while",
            Self::Repeat { .. } => "repeat",
        }
    }
}

impl<A> fmt::Debug for FlowController<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear { body } => f
                .debug_struct("Linear")
                .field("body", &body.len())
                .finish(),
            Self::Conditional { body, .. } => f
                .debug_struct("Conditional")
                .field("body", &body.len())
                .finish(),
            Self::DoWhile {
                max_iterations,
                body,
                ..
            } => f
                .debug_struct("DoWhile")
                .field("max_iterations", max_iterations)
                .field("body", &body.len())
                .finish(),
            Self::Repeat { count, body } => f
                .debug_struct("Repeat")
                .field("count", count)
                .field("body", &body.len())
                .finish(),
        }
    }
}

fn collect<A>(body: impl IntoIterator<Item = impl Into<Item<A>>>) -> Vec<Item<A>> {
    body.into_iter().map(Into::into).collect()
}

/// Keyword arguments forwarded from an `add()` call to the controller
/// constructor selected for that group.
#[derive(Clone, Default)]
pub struct ControllerArgs {
    /// Predicate for predicate-driven controllers.
    pub condition: Option<FlowCondition>,
    /// Iteration bound override for bounded loops.
    pub max_iterations: Option<usize>,
    /// Repetition count for fixed-count loops.
    pub count: Option<usize>,
}

/// Constructor stored in the control-flow plugin registry.
///
/// Given the group's items and the keyword arguments from the `add()` call,
/// produces the controller that will govern the group.
pub type ControllerCtor<A> =
    Arc<dyn Fn(Vec<Item<A>>, ControllerArgs) -> SchedResult<FlowController<A>> + Send + Sync>;

/// Constructor behind the [`CONDITION`] registry entry.
pub fn build_conditional<A>(
    body: Vec<Item<A>>,
    args: ControllerArgs,
) -> SchedResult<FlowController<A>> {
    let condition = args
        .condition
        .ok_or_else(|| SchedError::MalformedPassDeclaration {
            reason: "the condition controller needs a predicate".to_owned(),
        })?;
    Ok(FlowController::Conditional { condition, body })
}

/// Constructor behind the [`DO_WHILE`] registry entry.
pub fn build_do_while<A>(
    body: Vec<Item<A>>,
    args: ControllerArgs,
) -> SchedResult<FlowController<A>> {
    let condition = args
        .condition
        .ok_or_else(|| SchedError::MalformedPassDeclaration {
            reason: "the do_while controller needs a predicate".to_owned(),
        })?;
    Ok(FlowController::DoWhile {
        condition,
        max_iterations: args.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_items() -> Vec<Item<u32>> {
        Vec::new()
    }

    #[test]
    fn test_build_conditional_needs_predicate() {
        let err = build_conditional(no_items(), ControllerArgs::default()).unwrap_err();
        assert!(matches!(err, SchedError::MalformedPassDeclaration { .. }));
    }

    #[test]
    fn test_build_do_while_defaults_bound() {
        let args = ControllerArgs {
            condition: Some(Arc::new(|_| false)),
            ..ControllerArgs::default()
        };
        let controller = build_do_while(no_items(), args).unwrap();
        match controller {
            FlowController::DoWhile { max_iterations, .. } => {
                assert_eq!(max_iterations, DEFAULT_MAX_ITERATIONS);
            }
            other => panic!("expected do_while, got {}", other.name()),
        }
    }

    #[test]
    fn test_build_do_while_honors_bound_override() {
        let args = ControllerArgs {
            condition: Some(Arc::new(|_| true)),
            max_iterations: Some(7),
            ..ControllerArgs::default()
        };
        let controller = build_do_while(no_items(), args).unwrap();
        match controller {
            FlowController::DoWhile { max_iterations, .. } => assert_eq!(max_iterations, 7),
            other => panic!("expected do_while, got {}", other.name()),
        }
    }

    #[test]
    fn test_helper_constructors() {
        assert_eq!(FlowController::<u32>::linear(no_items()).name(), "linear");
        assert_eq!(
            FlowController::<u32>::conditional(|props| props.flag("go"), no_items()).name(),
            "conditional"
        );
        assert_eq!(
            FlowController::<u32>::do_while(|_| false, no_items()).name(),
            "do_while"
        );
        assert_eq!(FlowController::<u32>::repeat(3, no_items()).name(), "repeat");
    }
}
