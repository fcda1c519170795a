//! Artifact resolution engine.
//!
//! [`Resolver::resolve`] answers "what concrete artifact does output `key` of
//! task `name` refer to?". Composite tasks forward their outputs to sub-tasks
//! through selectors; the resolver follows them hop by hop until it reaches a
//! leaf task, then fetches that leaf's artifacts once through the
//! [`ArtifactReader`].
//!
//! The walk is an explicit loop. Every `(task, output key)` pair visited in a
//! walk is remembered so a selector cycle fails instead of spinning, and the
//! number of composite hops is capped by [`ResolverConfig::max_depth`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strata_metadata::{ArtifactReader, ArtifactSelector, Execution, RuntimeArtifact, TaskGraph};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{ResolutionStep, ResolveError, ResolveErrorKind};
use crate::session::{ResolutionCache, ResolutionSession};

/// Default cap on composite nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration for the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
  /// Maximum number of composite hops in one resolution.
  #[serde(default = "default_max_depth")]
  pub max_depth: usize,
}

fn default_max_depth() -> usize {
  DEFAULT_MAX_DEPTH
}

impl Default for ResolverConfig {
  fn default() -> Self {
    Self {
      max_depth: DEFAULT_MAX_DEPTH,
    }
  }
}

/// Resolves task outputs to runtime artifact descriptors.
///
/// Stateless apart from the reader it holds: a resolver can serve any number
/// of graph snapshots, concurrently.
pub struct Resolver<R> {
  reader: R,
  config: ResolverConfig,
}

impl<R: ArtifactReader> Resolver<R> {
  /// Create a resolver with the default configuration.
  pub fn new(reader: R) -> Self {
    Self::with_config(reader, ResolverConfig::default())
  }

  pub fn with_config(reader: R, config: ResolverConfig) -> Self {
    Self { reader, config }
  }

  pub fn reader(&self) -> &R {
    &self.reader
  }

  pub fn config(&self) -> &ResolverConfig {
    &self.config
  }

  /// Open a caching session over one graph snapshot.
  pub fn session<'a>(&'a self, graph: &'a TaskGraph) -> ResolutionSession<'a, R> {
    ResolutionSession::new(self, graph)
  }

  /// Resolve `output_key` of `task_name` to a concrete artifact.
  #[instrument(
    name = "resolve_artifact",
    skip(self, graph, cancel),
    fields(task_name = %task_name, output_key = %output_key)
  )]
  pub async fn resolve(
    &self,
    graph: &TaskGraph,
    task_name: &str,
    output_key: &str,
    cancel: &CancellationToken,
  ) -> Result<RuntimeArtifact, ResolveError> {
    let result = self
      .walk(graph, ResolutionStep::new(task_name, output_key), cancel, None)
      .await;
    log_outcome(&result);
    result
  }

  /// Resolve several outputs against the same snapshot concurrently.
  ///
  /// Results come back in request order.
  pub async fn resolve_many(
    &self,
    graph: &TaskGraph,
    requests: &[(&str, &str)],
    cancel: &CancellationToken,
  ) -> Vec<Result<RuntimeArtifact, ResolveError>> {
    futures::future::join_all(
      requests
        .iter()
        .map(|(task_name, output_key)| self.resolve(graph, task_name, output_key, cancel)),
    )
    .await
  }

  /// Follow selectors from `start` until a leaf is reached.
  pub(crate) async fn walk(
    &self,
    graph: &TaskGraph,
    start: ResolutionStep,
    cancel: &CancellationToken,
    cache: Option<&ResolutionCache>,
  ) -> Result<RuntimeArtifact, ResolveError> {
    let mut current = start;
    let mut trail: Vec<ResolutionStep> = Vec::new();
    let mut visited: HashSet<ResolutionStep> = HashSet::new();

    loop {
      if cancel.is_cancelled() {
        return Err(ResolveError::new(ResolveErrorKind::Cancelled, trail));
      }

      if let Some(cache) = cache {
        if let Some(hit) = cache.get(&current) {
          debug!(task_name = %current.task_name, output_key = %current.output_key, "cache_hit");
          cache.insert_all(&trail, &hit);
          return Ok(hit);
        }
      }

      if !visited.insert(current.clone()) {
        let kind = ResolveErrorKind::CyclicReference {
          task_name: current.task_name,
          output_key: current.output_key,
        };
        return Err(ResolveError::new(kind, trail));
      }

      let Some(execution) = graph.get(&current.task_name) else {
        let kind = ResolveErrorKind::UnknownTask {
          task_name: current.task_name,
        };
        return Err(ResolveError::new(kind, trail));
      };

      if !execution.is_composite() {
        let artifact = match self.fetch_leaf(execution, &current, cancel).await {
          Ok(artifact) => artifact,
          Err(kind) => return Err(ResolveError::new(kind, trail)),
        };
        if let Some(cache) = cache {
          trail.push(current);
          cache.insert_all(&trail, &artifact);
        }
        return Ok(artifact);
      }

      if trail.len() >= self.config.max_depth {
        let kind = ResolveErrorKind::DepthLimitExceeded {
          max_depth: self.config.max_depth,
        };
        return Err(ResolveError::new(kind, trail));
      }

      let selector = match select_producer(execution, &current) {
        Ok(selector) => selector,
        Err(kind) => return Err(ResolveError::new(kind, trail)),
      };

      debug!(
        task_name = %current.task_name,
        output_key = %current.output_key,
        producer_subtask = %selector.producer_subtask,
        producer_output_key = %selector.output_artifact_key,
        depth = trail.len(),
        "following_selector"
      );

      trail.push(current);
      current = ResolutionStep::new(selector.producer_subtask, selector.output_artifact_key);
    }
  }

  /// Fetch a leaf's artifacts and convert the requested one.
  async fn fetch_leaf(
    &self,
    execution: &Execution,
    step: &ResolutionStep,
    cancel: &CancellationToken,
  ) -> Result<RuntimeArtifact, ResolveErrorKind> {
    debug!(
      task_name = %step.task_name,
      execution_id = execution.id,
      "fetching_output_artifacts"
    );

    let fetched = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(ResolveErrorKind::Cancelled),
      fetched = self.reader.get_output_artifacts(execution.id) => fetched,
    };

    let outputs = fetched.map_err(|source| ResolveErrorKind::UpstreamFetchFailed {
      task_name: step.task_name.clone(),
      execution_id: execution.id,
      source,
    })?;

    let output =
      outputs
        .get(&step.output_key)
        .ok_or_else(|| ResolveErrorKind::ArtifactKeyNotProduced {
          task_name: step.task_name.clone(),
          output_key: step.output_key.clone(),
        })?;

    output
      .to_runtime_artifact()
      .map_err(|source| ResolveErrorKind::DescriptorConversionFailed {
        task_name: step.task_name.clone(),
        output_key: step.output_key.clone(),
        source,
      })
  }
}

/// Pick the selector a composite task forwards `step.output_key` through.
fn select_producer(
  execution: &Execution,
  step: &ResolutionStep,
) -> Result<ArtifactSelector, ResolveErrorKind> {
  let mapping = execution
    .output_artifacts()
    .map_err(|e| ResolveErrorKind::MalformedMetadata {
      task_name: step.task_name.clone(),
      message: e.to_string(),
    })?
    .ok_or_else(|| ResolveErrorKind::MissingOutputMapping {
      task_name: step.task_name.clone(),
    })?;

  let spec = mapping
    .get(&step.output_key)
    .ok_or_else(|| ResolveErrorKind::UnknownOutputKey {
      task_name: step.task_name.clone(),
      output_key: step.output_key.clone(),
    })?;

  if spec.artifact_selectors.len() > 1 {
    warn!(
      task_name = %step.task_name,
      output_key = %step.output_key,
      selectors = spec.artifact_selectors.len(),
      "multiple artifact selectors, using the last"
    );
  }

  spec
    .effective_selector()
    .cloned()
    .ok_or_else(|| ResolveErrorKind::MalformedMetadata {
      task_name: step.task_name.clone(),
      message: format!("output '{}' has no artifact selectors", step.output_key),
    })
}

pub(crate) fn log_outcome(result: &Result<RuntimeArtifact, ResolveError>) {
  match result {
    Ok(artifact) => {
      debug!(uri = %artifact.uri, "artifact_resolved");
    }
    Err(e) if e.is_cancelled() => {
      debug!("artifact_resolution_cancelled");
    }
    Err(e) => {
      warn!(error = %e, depth = e.depth(), "artifact_resolution_failed");
    }
  }
}
