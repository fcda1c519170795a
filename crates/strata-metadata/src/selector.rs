//! Output-artifact indirections carried by composite executions.
//!
//! A composite (DAG) execution does not produce artifacts itself. Its
//! `output_artifacts` custom property is a JSON document mapping each declared
//! output key to the sub-task output it forwards:
//!
//! ```json
//! {
//!   "model": {
//!     "artifactSelectors": [
//!       { "producerSubtask": "train", "outputArtifactKey": "out_model" }
//!     ]
//!   }
//! }
//! ```
//!
//! The snake_case field names written by protobuf JSON encoders are accepted
//! too. Unknown fields are rejected.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Names where, one level down in a sub-pipeline, an output really comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArtifactSelector {
  #[serde(alias = "producer_subtask")]
  pub producer_subtask: String,
  #[serde(alias = "output_artifact_key")]
  pub output_artifact_key: String,
}

impl ArtifactSelector {
  pub fn new(producer_subtask: impl Into<String>, output_artifact_key: impl Into<String>) -> Self {
    Self {
      producer_subtask: producer_subtask.into(),
      output_artifact_key: output_artifact_key.into(),
    }
  }
}

/// Selector list for one declared output of a composite execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DagOutputArtifactSpec {
  #[serde(alias = "artifact_selectors")]
  pub artifact_selectors: Vec<ArtifactSelector>,
}

impl DagOutputArtifactSpec {
  /// The selector that determines where the output comes from.
  ///
  /// When the list holds several entries the last one wins. Earlier entries
  /// are not consulted.
  pub fn effective_selector(&self) -> Option<&ArtifactSelector> {
    self.artifact_selectors.last()
  }
}

/// Decoded `output_artifacts` property of a composite execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputArtifactsMapping {
  outputs: HashMap<String, DagOutputArtifactSpec>,
}

impl OutputArtifactsMapping {
  pub fn new() -> Self {
    Self::default()
  }

  /// Decode the serialized mapping.
  pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(raw)
  }

  /// Encode the mapping in its camelCase wire form.
  pub fn encode(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }

  /// Add an output forwarded through the given selectors.
  pub fn with_output(
    mut self,
    output_key: impl Into<String>,
    selectors: impl IntoIterator<Item = ArtifactSelector>,
  ) -> Self {
    self.outputs.insert(
      output_key.into(),
      DagOutputArtifactSpec {
        artifact_selectors: selectors.into_iter().collect(),
      },
    );
    self
  }

  /// Get the selector list for an output key.
  pub fn get(&self, output_key: &str) -> Option<&DagOutputArtifactSpec> {
    self.outputs.get(output_key)
  }

  /// Iterate over declared output keys and their selector lists.
  pub fn iter(&self) -> impl Iterator<Item = (&String, &DagOutputArtifactSpec)> {
    self.outputs.iter()
  }

  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }
}
