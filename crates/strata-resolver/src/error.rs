//! Error types for artifact resolution.

use std::fmt;

use strata_metadata::ConversionError;

/// One `(task, output key)` hop of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionStep {
  pub task_name: String,
  pub output_key: String,
}

impl ResolutionStep {
  pub fn new(task_name: impl Into<String>, output_key: impl Into<String>) -> Self {
    Self {
      task_name: task_name.into(),
      output_key: output_key.into(),
    }
  }
}

impl fmt::Display for ResolutionStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.task_name, self.output_key)
  }
}

/// What went wrong during resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveErrorKind {
  /// The task is not part of the graph snapshot.
  #[error("task '{task_name}' not found in graph")]
  UnknownTask { task_name: String },

  /// A composite task carries no output mapping.
  #[error("cannot find output_artifacts on composite task '{task_name}'")]
  MissingOutputMapping { task_name: String },

  /// A composite task's output mapping could not be decoded.
  #[error("malformed output_artifacts on task '{task_name}': {message}")]
  MalformedMetadata { task_name: String, message: String },

  /// A composite task does not declare the requested output.
  #[error("composite task '{task_name}' declares no output '{output_key}'")]
  UnknownOutputKey {
    task_name: String,
    output_key: String,
  },

  /// The selector chain revisits a `(task, output key)` pair.
  #[error("cyclic artifact reference through task '{task_name}' output '{output_key}'")]
  CyclicReference {
    task_name: String,
    output_key: String,
  },

  /// Composite nesting is deeper than the configured maximum.
  #[error("composite nesting exceeds the maximum depth of {max_depth}")]
  DepthLimitExceeded { max_depth: usize },

  /// The metadata store failed to return a leaf's artifacts.
  #[error("failed to fetch output artifacts of task '{task_name}' (execution {execution_id}): {source}")]
  UpstreamFetchFailed {
    task_name: String,
    execution_id: i64,
    #[source]
    source: strata_metadata::Error,
  },

  /// The leaf task did not produce the requested output.
  #[error("cannot find output artifact key '{output_key}' in producer task '{task_name}'")]
  ArtifactKeyNotProduced {
    task_name: String,
    output_key: String,
  },

  /// The produced artifact could not be turned into a runtime descriptor.
  #[error("failed to convert artifact '{output_key}' of task '{task_name}': {source}")]
  DescriptorConversionFailed {
    task_name: String,
    output_key: String,
    #[source]
    source: ConversionError,
  },

  /// Resolution was cancelled by the caller.
  #[error("resolution cancelled")]
  Cancelled,
}

/// A resolution failure together with the composite hops taken before it.
///
/// The kind is never rewritten on the way out: a failure three levels down a
/// sub-pipeline surfaces with the same kind it was raised with, and the trail
/// records how it was reached (outermost first).
#[derive(Debug)]
pub struct ResolveError {
  kind: ResolveErrorKind,
  trail: Vec<ResolutionStep>,
}

impl ResolveError {
  pub(crate) fn new(kind: ResolveErrorKind, trail: Vec<ResolutionStep>) -> Self {
    Self { kind, trail }
  }

  pub fn kind(&self) -> &ResolveErrorKind {
    &self.kind
  }

  pub fn into_kind(self) -> ResolveErrorKind {
    self.kind
  }

  /// Composite hops taken before the failure, outermost first.
  pub fn trail(&self) -> &[ResolutionStep] {
    &self.trail
  }

  /// Composite nesting depth at which the failure occurred.
  pub fn depth(&self) -> usize {
    self.trail.len()
  }

  /// Whether retrying the same resolution may succeed.
  ///
  /// Only metadata store fetch failures qualify. Every other kind reproduces
  /// until the graph or its metadata is fixed.
  pub fn is_transient(&self) -> bool {
    matches!(self.kind, ResolveErrorKind::UpstreamFetchFailed { .. })
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self.kind, ResolveErrorKind::Cancelled)
  }
}

impl From<ResolveErrorKind> for ResolveError {
  fn from(kind: ResolveErrorKind) -> Self {
    Self::new(kind, Vec::new())
  }
}

impl fmt::Display for ResolveError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.kind)?;
    if let Some((first, rest)) = self.trail.split_first() {
      write!(f, " (via {}", first)?;
      for step in rest {
        write!(f, " -> {}", step)?;
      }
      write!(f, ")")?;
    }
    Ok(())
  }
}

impl std::error::Error for ResolveError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    std::error::Error::source(&self.kind)
  }
}
