//! Per-snapshot resolution cache.
//!
//! A [`ResolutionSession`] borrows one [`TaskGraph`] and remembers every
//! `(task, output key)` pair it has resolved. Resolving a second output that
//! funnels through the same composite tasks skips the metadata store. The
//! borrow ties the cache to its snapshot: it cannot be reused for another one.

use std::collections::HashMap;
use std::sync::RwLock;

use strata_metadata::{ArtifactReader, RuntimeArtifact, TaskGraph};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::{ResolutionStep, ResolveError};
use crate::resolver::{Resolver, log_outcome};

/// Cache of resolved descriptors, keyed by the pair they were resolved for.
#[derive(Default)]
pub(crate) struct ResolutionCache {
  entries: RwLock<HashMap<ResolutionStep, RuntimeArtifact>>,
}

impl ResolutionCache {
  pub(crate) fn get(&self, step: &ResolutionStep) -> Option<RuntimeArtifact> {
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    entries.get(step).cloned()
  }

  /// Cache `artifact` for every pair on the chain that led to it.
  pub(crate) fn insert_all(&self, chain: &[ResolutionStep], artifact: &RuntimeArtifact) {
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    for step in chain {
      entries.insert(step.clone(), artifact.clone());
    }
  }

  fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
  }
}

/// Caching resolution scope over a single graph snapshot.
pub struct ResolutionSession<'a, R> {
  resolver: &'a Resolver<R>,
  graph: &'a TaskGraph,
  cache: ResolutionCache,
}

impl<'a, R: ArtifactReader> ResolutionSession<'a, R> {
  pub(crate) fn new(resolver: &'a Resolver<R>, graph: &'a TaskGraph) -> Self {
    Self {
      resolver,
      graph,
      cache: ResolutionCache::default(),
    }
  }

  /// The snapshot this session resolves against.
  pub fn graph(&self) -> &TaskGraph {
    self.graph
  }

  /// Number of cached `(task, output key)` pairs.
  pub fn cached(&self) -> usize {
    self.cache.len()
  }

  /// Resolve `output_key` of `task_name`, reusing earlier results.
  #[instrument(
    name = "session_resolve_artifact",
    skip(self, cancel),
    fields(task_name = %task_name, output_key = %output_key)
  )]
  pub async fn resolve(
    &self,
    task_name: &str,
    output_key: &str,
    cancel: &CancellationToken,
  ) -> Result<RuntimeArtifact, ResolveError> {
    let result = self
      .resolver
      .walk(
        self.graph,
        ResolutionStep::new(task_name, output_key),
        cancel,
        Some(&self.cache),
      )
      .await;
    log_outcome(&result);
    result
  }
}
