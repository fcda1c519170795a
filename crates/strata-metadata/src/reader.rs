//! Read contract against the metadata store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::artifact::OutputArtifact;
use crate::error::Error;

/// Fetches the concrete artifacts produced by a leaf execution.
///
/// Implemented by the metadata/lineage store. Implementations must be safe to
/// share across concurrent resolutions; pooling and retries are theirs.
#[async_trait]
pub trait ArtifactReader: Send + Sync {
  /// Get the output artifacts of an execution, keyed by output name.
  ///
  /// An execution that produced nothing yields an empty map.
  async fn get_output_artifacts(
    &self,
    execution_id: i64,
  ) -> Result<HashMap<String, OutputArtifact>, Error>;
}

#[async_trait]
impl<T: ArtifactReader + ?Sized> ArtifactReader for Arc<T> {
  async fn get_output_artifacts(
    &self,
    execution_id: i64,
  ) -> Result<HashMap<String, OutputArtifact>, Error> {
    (**self).get_output_artifacts(execution_id).await
  }
}

/// In-memory artifact reader.
#[derive(Default)]
pub struct InMemoryArtifactReader {
  outputs: RwLock<HashMap<i64, HashMap<String, OutputArtifact>>>,
}

impl InMemoryArtifactReader {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record an artifact produced by `execution_id` under its output name.
  pub async fn insert(&self, execution_id: i64, artifact: OutputArtifact) {
    self
      .outputs
      .write()
      .await
      .entry(execution_id)
      .or_default()
      .insert(artifact.name.clone(), artifact);
  }
}

impl FromIterator<(i64, OutputArtifact)> for InMemoryArtifactReader {
  fn from_iter<I: IntoIterator<Item = (i64, OutputArtifact)>>(iter: I) -> Self {
    let mut outputs: HashMap<i64, HashMap<String, OutputArtifact>> = HashMap::new();
    for (execution_id, artifact) in iter {
      outputs
        .entry(execution_id)
        .or_default()
        .insert(artifact.name.clone(), artifact);
    }
    Self {
      outputs: RwLock::new(outputs),
    }
  }
}

#[async_trait]
impl ArtifactReader for InMemoryArtifactReader {
  async fn get_output_artifacts(
    &self,
    execution_id: i64,
  ) -> Result<HashMap<String, OutputArtifact>, Error> {
    Ok(
      self
        .outputs
        .read()
        .await
        .get(&execution_id)
        .cloned()
        .unwrap_or_default(),
    )
  }
}

/// Reads output artifacts from a JSON export of the metadata store.
///
/// The file maps execution ids to output artifacts by key:
///
/// ```json
/// { "7": { "out_model": { "name": "out_model", "artifact": { "id": 1, "uri": "s3://b/k", "type_name": "system.Model" } } } }
/// ```
///
/// The file is re-read on every call so a running export is always current.
pub struct JsonFileArtifactReader {
  path: PathBuf,
}

impl JsonFileArtifactReader {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

#[async_trait]
impl ArtifactReader for JsonFileArtifactReader {
  async fn get_output_artifacts(
    &self,
    execution_id: i64,
  ) -> Result<HashMap<String, OutputArtifact>, Error> {
    let content = tokio::fs::read_to_string(&self.path).await?;
    let mut all: HashMap<i64, HashMap<String, OutputArtifact>> = serde_json::from_str(&content)?;
    Ok(all.remove(&execution_id).unwrap_or_default())
  }
}
