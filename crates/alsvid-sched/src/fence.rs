//! Fenced views over the artifact and the property set.
//!
//! Before a pass executes, the scheduler wraps the resource the pass must
//! not mutate in a fenced view. Reads pass straight through ([`Deref`]);
//! the write entry points exist but always fail with
//! [`SchedError::AccessViolation`], naming the resource and the offending
//! pass. Combined with the borrow rules (the views only ever hold a shared
//! reference) this turns a wrong-contract pass into a distinct fatal error
//! instead of a silent mutation.

use std::any::Any;
use std::fmt;
use std::ops::Deref;

use crate::error::{SchedError, SchedResult};
use crate::pass::PassId;
use crate::property::PropertySet;

/// The resource a fenced view protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FencedResource {
    /// The artifact being compiled.
    Artifact,
    /// The shared property set.
    PropertySet,
}

impl fmt::Display for FencedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact => f.write_str("artifact"),
            Self::PropertySet => f.write_str("property set"),
        }
    }
}

/// Read-only view of the artifact, handed to analysis passes.
pub struct FencedArtifact<'a, A> {
    inner: &'a A,
    pass: PassId,
}

impl<'a, A> FencedArtifact<'a, A> {
    pub(crate) fn new(inner: &'a A, pass: PassId) -> Self {
        Self { inner, pass }
    }

    /// Request mutable access to the artifact.
    ///
    /// Always fails: analysis passes must not rewrite the artifact. The
    /// returned error identifies this view's pass.
    pub fn try_mut(&self) -> SchedResult<&'a mut A> {
        Err(SchedError::AccessViolation {
            resource: FencedResource::Artifact,
            pass: self.pass.clone(),
        })
    }
}

impl<A> Deref for FencedArtifact<'_, A> {
    type Target = A;

    fn deref(&self) -> &A {
        self.inner
    }
}

/// Read-only view of the property set, handed to transformation passes.
///
/// All of [`PropertySet`]'s read surface is reachable through [`Deref`].
/// The write methods below shadow the unfenced ones and always fail.
pub struct FencedPropertySet<'a> {
    inner: &'a PropertySet,
    pass: PassId,
}

impl<'a> FencedPropertySet<'a> {
    pub(crate) fn new(inner: &'a PropertySet, pass: PassId) -> Self {
        Self { inner, pass }
    }

    fn violation(&self) -> SchedError {
        SchedError::AccessViolation {
            resource: FencedResource::PropertySet,
            pass: self.pass.clone(),
        }
    }

    /// Insert a value into the property set. Always fails: transformation
    /// passes must not write metadata.
    pub fn insert<T: Any + Send + Sync>(&self, _key: impl Into<String>, _value: T) -> SchedResult<()> {
        Err(self.violation())
    }

    /// Request mutable access to a stored value. Always fails.
    pub fn get_mut<T: Any>(&self, _key: &str) -> SchedResult<&'a mut T> {
        Err(self.violation())
    }

    /// Remove a value from the property set. Always fails.
    pub fn remove<T: Any>(&self, _key: &str) -> SchedResult<Option<T>> {
        Err(self.violation())
    }
}

impl Deref for FencedPropertySet<'_> {
    type Target = PropertySet;

    fn deref(&self) -> &PropertySet {
        self.inner
    }
}
