//! Alsvid Pass Scheduling Engine
//!
//! This crate provides the scheduling core for pass-based compilation: an
//! ordered, flow-controlled schedule of analysis and transformation passes
//! executed against a single mutable artifact, with a shared property set
//! for pass-to-pass communication. It is representation-agnostic — the
//! artifact is an opaque type parameter, so the same engine drives a
//! quantum-circuit DAG, a classical IR, or anything else a pass pipeline
//! rewrites.
//!
//! # Architecture
//!
//! ```text
//! Input Artifact
//!       │
//!       ▼
//! ┌─────────────┐     PropertySet (per run, written by analysis passes)
//! │ PassManager │ ◄── valid-pass cache (per run, drives skip/invalidate)
//! └─────────────┘     plugin registry (condition, do_while, custom)
//!       │
//!       ├── FlowController::Linear / Conditional / DoWhile / Repeat
//!       │        └── Pass::Analysis / Pass::Transformation
//!       ▼
//! Output Artifact
//! ```
//!
//! Passes declare `requires` (passes that must have run, and still be
//! valid, first) and `preserves` (whose validity survives them). The
//! engine resolves requirements depth-first, elides still-valid idempotent
//! passes, and invalidates the valid-pass cache after every transformation
//! according to its preserves set. Fenced views make the access contract
//! hard: an analysis pass cannot rewrite the artifact, a transformation
//! pass cannot write the property set, and attempting either aborts the
//! run with [`SchedError::AccessViolation`].
//!
//! # Example
//!
//! ```
//! use alsvid_sched::{
//!     compile, FencedPropertySet, Pass, PassId, PassManager, SchedResult,
//!     TransformationPass,
//! };
//!
//! // The artifact can be any type; here, a toy gate list.
//! struct LowerNames;
//!
//! impl TransformationPass<Vec<String>> for LowerNames {
//!     fn id(&self) -> PassId {
//!         PassId::new("lower_names")
//!     }
//!
//!     fn transform(
//!         &self,
//!         mut artifact: Vec<String>,
//!         _properties: &FencedPropertySet<'_>,
//!     ) -> SchedResult<Option<Vec<String>>> {
//!         for op in &mut artifact {
//!             *op = op.to_lowercase();
//!         }
//!         Ok(Some(artifact))
//!     }
//! }
//!
//! let mut manager = PassManager::new();
//! manager.add_pass(Pass::transformation(LowerNames));
//!
//! let compiled = compile(vec!["CX 0 1".to_owned()], &mut manager)?;
//! assert_eq!(compiled, vec!["cx 0 1"]);
//! assert_eq!(manager.trace().len(), 1);
//! # Ok::<(), alsvid_sched::SchedError>(())
//! ```
//!
//! # Control flow
//!
//! Groups added via [`PassManager::add`] can be conditioned or repeated:
//!
//! ```no_run
//! # use alsvid_sched::{GroupOptions, Pass, PassManager};
//! # fn passes() -> Vec<Pass<u32>> { vec![] }
//! let mut manager: PassManager<u32> = PassManager::new();
//!
//! // Runs only if an earlier analysis pass set the flag.
//! manager.add(passes(), GroupOptions::new().condition(|props| props.flag("needs_routing")))?;
//!
//! // Repeats until a fixed point, at most 100 times.
//! manager.add(
//!     passes(),
//!     GroupOptions::new()
//!         .do_while(|props| !props.flag("fixed_point"))
//!         .max_iterations(100),
//! )?;
//! # Ok::<(), alsvid_sched::SchedError>(())
//! ```
//!
//! New control-flow shapes are registered at runtime with
//! [`PassManager::add_control_flow_plugin`]; a registered constructor
//! assembles the closed [`FlowController`] variant set around the group it
//! is given.

pub mod error;
pub mod fence;
pub mod flow;
pub mod manager;
pub mod pass;
pub mod property;

pub use error::{SchedError, SchedResult};
pub use fence::{FencedArtifact, FencedPropertySet, FencedResource};
pub use flow::{
    ControllerArgs, ControllerCtor, FlowCondition, FlowController, Item, CONDITION,
    DEFAULT_MAX_ITERATIONS, DO_WHILE,
};
pub use manager::{compile, GroupOptions, PassManager, TraceEntry};
pub use pass::{AnalysisPass, Pass, PassId, PassKind, PassOptions, TransformationPass};
pub use property::PropertySet;
