//! Strata Resolver
//!
//! Execution-time artifact resolution for pipelines whose tasks may be
//! sub-pipelines. Given a [`TaskGraph`](strata_metadata::TaskGraph) snapshot,
//! a task name and one of its output keys, the [`Resolver`] walks composite
//! indirections down to the leaf task that produced the artifact and returns
//! its [`RuntimeArtifact`](strata_metadata::RuntimeArtifact) descriptor.
//!
//! Failures carry a [`ResolveErrorKind`] and the trail of composite hops that
//! led to them. Nothing is ever resolved to a default or empty artifact.

mod error;
mod resolver;
mod session;

pub use error::{ResolutionStep, ResolveError, ResolveErrorKind};
pub use resolver::{DEFAULT_MAX_DEPTH, Resolver, ResolverConfig};
pub use session::ResolutionSession;
