//! Object tags.

use serde::{Deserialize, Serialize};
use strata_metadata::{ArtifactSchema, RuntimeArtifact};

/// Tag key for the task that produced an artifact.
pub const PRODUCER_TASK_TAG: &str = "strata/producer-task";
/// Tag key for the output key the artifact was resolved from.
pub const OUTPUT_KEY_TAG: &str = "strata/output-key";
/// Tag key for the artifact name.
pub const ARTIFACT_NAME_TAG: &str = "strata/artifact-name";
/// Tag key for the artifact type schema title.
pub const ARTIFACT_TYPE_TAG: &str = "strata/artifact-type";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  pub key: String,
  pub value: String,
}

impl Tag {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
    }
  }
}

/// Ordered list of tags applied to an object.
///
/// Applying a tag set replaces the object's previous tags entirely, so
/// applying the same set twice leaves the object as it was after the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet {
  tags: Vec<Tag>,
}

impl TagSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a tag.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.tags.push(Tag::new(key, value));
    self
  }

  /// Provenance tags for an artifact resolved from `output_key` of `task_name`.
  pub fn lineage(task_name: &str, output_key: &str, artifact: &RuntimeArtifact) -> Self {
    let artifact_type = match &artifact.artifact_type {
      ArtifactSchema::SchemaTitle(title) => title.as_str(),
      ArtifactSchema::InstanceSchema(_) => "instance-schema",
    };
    Self::new()
      .with(PRODUCER_TASK_TAG, task_name)
      .with(OUTPUT_KEY_TAG, output_key)
      .with(ARTIFACT_NAME_TAG, artifact.name.as_str())
      .with(ARTIFACT_TYPE_TAG, artifact_type)
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .tags
      .iter()
      .find(|t| t.key == key)
      .map(|t| t.value.as_str())
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
    self.tags.iter()
  }

  pub fn len(&self) -> usize {
    self.tags.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tags.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      tags: iter.into_iter().map(|(k, v)| Tag::new(k, v)).collect(),
    }
  }
}

impl<'a> IntoIterator for &'a TagSet {
  type Item = &'a Tag;
  type IntoIter = std::slice::Iter<'a, Tag>;

  fn into_iter(self) -> Self::IntoIter {
    self.tags.iter()
  }
}
