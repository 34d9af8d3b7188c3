//! Pass traits, identity, and per-pass scheduling options.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::SchedResult;
use crate::fence::{FencedArtifact, FencedPropertySet};
use crate::property::PropertySet;

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Analysis pass that reads the artifact and writes the property set.
    Analysis,
    /// Transformation pass that rewrites the artifact.
    Transformation,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analysis => f.write_str("analysis"),
            Self::Transformation => f.write_str("transformation"),
        }
    }
}

/// Identity of a pass: its name plus the configuration it was built with.
///
/// The valid-pass cache, `requires` resolution and `preserves` declarations
/// all work in terms of `PassId`. Two pass instances are interchangeable for
/// scheduling purposes exactly when their ids compare equal, so a
/// configurable pass must fold its constructor arguments into the id:
///
/// ```
/// use alsvid_sched::PassId;
///
/// let bare = PassId::new("unroll");
/// let deep = PassId::configured("unroll", "depth=3");
/// assert_ne!(bare, deep);
/// assert_eq!(deep.to_string(), "unroll(depth=3)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId {
    name: Cow<'static, str>,
    config: Option<Cow<'static, str>>,
}

impl PassId {
    /// Identity for a pass with no constructor arguments.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            config: None,
        }
    }

    /// Identity for a pass configured with constructor arguments.
    ///
    /// The configuration string must be canonical: two instances built with
    /// the same arguments must render byte-identical configs.
    pub fn configured(name: &'static str, config: impl Into<String>) -> Self {
        Self {
            name: Cow::Borrowed(name),
            config: Some(Cow::Owned(config.into())),
        }
    }

    /// The pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration string, if the pass takes arguments.
    pub fn config(&self) -> Option<&str> {
        self.config.as_deref()
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config {
            Some(config) => write!(f, "{}({config})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl Serialize for PassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-pass scheduling options.
///
/// Each field is tri-state so the three configuration levels can layer: an
/// option set directly on a pass wins over the option passed to the `add()`
/// call for its group, which wins over the manager-level default.
///
/// Unset fields resolve to the built-in defaults: `idempotence = true`,
/// `ignore_requires = false`, `ignore_preserves = false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    idempotence: Option<bool>,
    ignore_requires: Option<bool>,
    ignore_preserves: Option<bool>,
}

impl PassOptions {
    /// Create options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether re-running this pass while it is still valid is elided.
    #[must_use]
    pub fn idempotence(mut self, value: bool) -> Self {
        self.idempotence = Some(value);
        self
    }

    /// Set whether the pass's `requires` list is honored.
    #[must_use]
    pub fn ignore_requires(mut self, value: bool) -> Self {
        self.ignore_requires = Some(value);
        self
    }

    /// Set whether the pass's `preserves` list is honored.
    #[must_use]
    pub fn ignore_preserves(mut self, value: bool) -> Self {
        self.ignore_preserves = Some(value);
        self
    }

    /// Layer `self` over a weaker level: fields set here win.
    #[must_use]
    pub(crate) fn layered_over(self, weaker: Self) -> Self {
        Self {
            idempotence: self.idempotence.or(weaker.idempotence),
            ignore_requires: self.ignore_requires.or(weaker.ignore_requires),
            ignore_preserves: self.ignore_preserves.or(weaker.ignore_preserves),
        }
    }

    /// Collapse unset fields to the built-in defaults.
    pub(crate) fn resolve(self) -> ResolvedOptions {
        ResolvedOptions {
            idempotence: self.idempotence.unwrap_or(true),
            ignore_requires: self.ignore_requires.unwrap_or(false),
            ignore_preserves: self.ignore_preserves.unwrap_or(false),
        }
    }
}

/// Options after precedence resolution, as seen by the execution engine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedOptions {
    pub idempotence: bool,
    pub ignore_requires: bool,
    pub ignore_preserves: bool,
}

/// An analysis pass: read-only over the artifact, writes the property set.
///
/// Analysis passes communicate exclusively through the [`PropertySet`]; the
/// artifact is handed to them behind a fenced view and any mutation attempt
/// aborts the run with an access violation.
pub trait AnalysisPass<A>: Send + Sync {
    /// Identity of this pass, including its configuration.
    fn id(&self) -> PassId;

    /// Options set directly on this pass instance; highest precedence level.
    fn options(&self) -> PassOptions {
        PassOptions::default()
    }

    /// Passes that must have run, and still be valid, before this one.
    fn requires(&self) -> Vec<Pass<A>> {
        Vec::new()
    }

    /// Identities whose validity this pass does not disturb.
    ///
    /// Analysis passes never invalidate anything, so this is metadata only;
    /// it participates in the shared declaration surface for uniformity.
    fn preserves(&self) -> Vec<PassId> {
        Vec::new()
    }

    /// Analyze the artifact and record results in the property set.
    fn analyze(
        &self,
        artifact: &FencedArtifact<'_, A>,
        properties: &mut PropertySet,
    ) -> SchedResult<()>;
}

/// A transformation pass: rewrites the artifact, read-only over the
/// property set.
pub trait TransformationPass<A>: Send + Sync {
    /// Identity of this pass, including its configuration.
    fn id(&self) -> PassId;

    /// Options set directly on this pass instance; highest precedence level.
    fn options(&self) -> PassOptions {
        PassOptions::default()
    }

    /// Passes that must have run, and still be valid, before this one.
    fn requires(&self) -> Vec<Pass<A>> {
        Vec::new()
    }

    /// Identities that stay valid after this pass has run.
    ///
    /// Everything not listed here is invalidated. A pass that declares no
    /// preserves invalidates the whole valid-pass cache.
    fn preserves(&self) -> Vec<PassId> {
        Vec::new()
    }

    /// Transform the artifact and return it, possibly replaced wholesale.
    ///
    /// Returning `Ok(None)` is a contract violation: the scheduler aborts
    /// the run with [`SchedError::MissingResult`](crate::SchedError::MissingResult).
    fn transform(
        &self,
        artifact: A,
        properties: &FencedPropertySet<'_>,
    ) -> SchedResult<Option<A>>;
}

/// A schedulable pass: the closed variant over the two execution contracts.
///
/// The scheduler dispatches on this enum rather than on runtime type
/// inspection; which resources a pass may write is fixed by the variant and
/// enforced by fencing at call time.
pub enum Pass<A> {
    /// Read-only over the artifact, writes the property set.
    Analysis(Arc<dyn AnalysisPass<A>>),
    /// Rewrites the artifact, read-only over the property set.
    Transformation(Arc<dyn TransformationPass<A>>),
}

impl<A> Clone for Pass<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Analysis(pass) => Self::Analysis(Arc::clone(pass)),
            Self::Transformation(pass) => Self::Transformation(Arc::clone(pass)),
        }
    }
}

impl<A> Pass<A> {
    /// Wrap an analysis pass for scheduling.
    pub fn analysis(pass: impl AnalysisPass<A> + 'static) -> Self {
        Self::Analysis(Arc::new(pass))
    }

    /// Wrap a transformation pass for scheduling.
    pub fn transformation(pass: impl TransformationPass<A> + 'static) -> Self {
        Self::Transformation(Arc::new(pass))
    }

    /// Identity of the wrapped pass.
    pub fn id(&self) -> PassId {
        match self {
            Self::Analysis(pass) => pass.id(),
            Self::Transformation(pass) => pass.id(),
        }
    }

    /// Kind of the wrapped pass.
    pub fn kind(&self) -> PassKind {
        match self {
            Self::Analysis(_) => PassKind::Analysis,
            Self::Transformation(_) => PassKind::Transformation,
        }
    }

    /// Options set directly on the wrapped pass.
    pub fn options(&self) -> PassOptions {
        match self {
            Self::Analysis(pass) => pass.options(),
            Self::Transformation(pass) => pass.options(),
        }
    }

    /// The wrapped pass's requirements.
    pub fn requires(&self) -> Vec<Pass<A>> {
        match self {
            Self::Analysis(pass) => pass.requires(),
            Self::Transformation(pass) => pass.requires(),
        }
    }

    /// The identities the wrapped pass preserves.
    pub fn preserves(&self) -> Vec<PassId> {
        match self {
            Self::Analysis(pass) => pass.preserves(),
            Self::Transformation(pass) => pass.preserves(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopAnalysis;

    impl AnalysisPass<u32> for NoopAnalysis {
        fn id(&self) -> PassId {
            PassId::new("noop")
        }

        fn analyze(
            &self,
            _artifact: &FencedArtifact<'_, u32>,
            _properties: &mut PropertySet,
        ) -> SchedResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pass_id_identity() {
        assert_eq!(PassId::new("unroll"), PassId::new("unroll"));
        assert_ne!(PassId::new("unroll"), PassId::new("fold"));
        assert_ne!(
            PassId::configured("unroll", "depth=2"),
            PassId::configured("unroll", "depth=3")
        );
        assert_eq!(
            PassId::configured("unroll", "depth=2"),
            PassId::configured("unroll", "depth=2")
        );
    }

    #[test]
    fn test_pass_id_display() {
        assert_eq!(PassId::new("fold").to_string(), "fold");
        assert_eq!(
            PassId::configured("unroll", "depth=3").to_string(),
            "unroll(depth=3)"
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(PassKind::Analysis.to_string(), "analysis");
        assert_eq!(PassKind::Transformation.to_string(), "transformation");
    }

    #[test]
    fn test_options_layering() {
        let pass = PassOptions::new().idempotence(false);
        let group = PassOptions::new().idempotence(true).ignore_preserves(true);
        let manager = PassOptions::new().ignore_requires(true);

        let resolved = pass.layered_over(group).layered_over(manager).resolve();
        assert!(!resolved.idempotence); // pass level wins
        assert!(resolved.ignore_preserves); // group level fills the gap
        assert!(resolved.ignore_requires); // manager level fills the gap
    }

    #[test]
    fn test_options_defaults() {
        let resolved = PassOptions::default().resolve();
        assert!(resolved.idempotence);
        assert!(!resolved.ignore_requires);
        assert!(!resolved.ignore_preserves);
    }

    #[test]
    fn test_pass_variant_metadata() {
        let pass = Pass::analysis(NoopAnalysis);
        assert_eq!(pass.kind(), PassKind::Analysis);
        assert_eq!(pass.id(), PassId::new("noop"));
        assert!(pass.requires().is_empty());
        assert!(pass.preserves().is_empty());
    }
}
