//! Error types for pass scheduling.

use thiserror::Error;

use crate::fence::FencedResource;
use crate::pass::PassId;

/// Errors that can occur while building or executing a pass schedule.
///
/// Every variant is fatal. The scheduler performs no local recovery: the
/// first error aborts the run and is surfaced to the caller unchanged, with
/// no guarantee about the state of the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SchedError {
    /// A pass wrote to a resource fenced against it.
    #[error("pass {pass} attempted to write the fenced {resource}")]
    AccessViolation {
        /// The resource the write was aimed at.
        resource: FencedResource,
        /// The offending pass.
        pass: PassId,
    },

    /// A transformation pass returned no artifact.
    #[error("transformation pass {pass} did not return an artifact")]
    MissingResult {
        /// The offending pass.
        pass: PassId,
    },

    /// A do-while controller exhausted its iteration bound before its
    /// predicate became false.
    #[error("reached the iteration limit of {limit} before a fixed point")]
    IterationLimitExceeded {
        /// The configured iteration bound.
        limit: usize,
    },

    /// A control-flow plugin name is not registered.
    #[error("unknown control-flow plugin '{name}'")]
    UnknownPlugin {
        /// The name that failed to resolve.
        name: String,
    },

    /// A pass or group declaration is invalid.
    #[error("malformed pass declaration: {reason}")]
    MalformedPassDeclaration {
        /// What is wrong with the declaration.
        reason: String,
    },

    /// A pass signaled a failure of its own during execution.
    #[error("pass {pass} failed: {message}")]
    PassFailed {
        /// The failing pass.
        pass: PassId,
        /// The failure description.
        message: String,
    },
}

/// Result type for scheduling operations.
pub type SchedResult<T> = Result<T, SchedError>;
