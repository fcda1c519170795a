use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::property::PropertyValue;
use crate::selector::OutputArtifactsMapping;

/// Type name of composite (sub-pipeline) executions.
pub const DAG_EXECUTION: &str = "system.DAGExecution";
/// Type name of container task executions.
pub const CONTAINER_EXECUTION: &str = "system.ContainerExecution";
/// Type name of importer executions.
pub const IMPORTER_EXECUTION: &str = "system.ImporterExecution";

/// Custom property holding a composite execution's output mapping.
pub const OUTPUT_ARTIFACTS_PROPERTY: &str = "output_artifacts";

/// Type tag of an execution.
///
/// Only [`ExecutionType::Dag`] is composite; everything else produces its
/// artifacts directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionType {
  Dag,
  Container,
  Importer,
  Other(String),
}

impl ExecutionType {
  pub fn as_str(&self) -> &str {
    match self {
      ExecutionType::Dag => DAG_EXECUTION,
      ExecutionType::Container => CONTAINER_EXECUTION,
      ExecutionType::Importer => IMPORTER_EXECUTION,
      ExecutionType::Other(name) => name,
    }
  }

  pub fn is_composite(&self) -> bool {
    matches!(self, ExecutionType::Dag)
  }
}

impl From<String> for ExecutionType {
  fn from(value: String) -> Self {
    match value.as_str() {
      DAG_EXECUTION => ExecutionType::Dag,
      CONTAINER_EXECUTION => ExecutionType::Container,
      IMPORTER_EXECUTION => ExecutionType::Importer,
      _ => ExecutionType::Other(value),
    }
  }
}

impl From<ExecutionType> for String {
  fn from(value: ExecutionType) -> Self {
    match value {
      ExecutionType::Other(name) => name,
      other => other.as_str().to_string(),
    }
  }
}

impl fmt::Display for ExecutionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Failure reading the output mapping of a composite execution.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
  /// The property exists but is not a string.
  #[error("expected a string value, found {found}")]
  NotAString { found: &'static str },

  /// The string is not a valid output mapping document.
  #[error("{0}")]
  Decode(#[from] serde_json::Error),
}

/// A task's execution record as persisted by the metadata store.
///
/// Read-only to the resolution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
  /// Opaque handle used against the metadata store.
  pub id: i64,
  #[serde(rename = "type")]
  pub execution_type: ExecutionType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default)]
  pub custom_properties: HashMap<String, PropertyValue>,
}

impl Execution {
  pub fn new(id: i64, execution_type: ExecutionType) -> Self {
    Self {
      id,
      execution_type,
      name: None,
      custom_properties: HashMap::new(),
    }
  }

  /// A composite execution forwarding outputs through `mapping`.
  pub fn composite(id: i64, mapping: &OutputArtifactsMapping) -> Result<Self, serde_json::Error> {
    let encoded = mapping.encode()?;
    Ok(Self::new(id, ExecutionType::Dag).with_property(OUTPUT_ARTIFACTS_PROPERTY, encoded))
  }

  /// A container (leaf) execution.
  pub fn container(id: i64) -> Self {
    Self::new(id, ExecutionType::Container)
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
    self.custom_properties.insert(key.into(), value.into());
    self
  }

  pub fn is_composite(&self) -> bool {
    self.execution_type.is_composite()
  }

  pub fn custom_property(&self, key: &str) -> Option<&PropertyValue> {
    self.custom_properties.get(key)
  }

  /// Decode the `output_artifacts` custom property.
  ///
  /// Returns `Ok(None)` when the property is absent. Whether absence is an
  /// error is up to the caller.
  pub fn output_artifacts(&self) -> Result<Option<OutputArtifactsMapping>, MappingError> {
    let Some(property) = self.custom_property(OUTPUT_ARTIFACTS_PROPERTY) else {
      return Ok(None);
    };
    let raw = property.as_str().ok_or(MappingError::NotAString {
      found: property.kind(),
    })?;
    Ok(Some(OutputArtifactsMapping::decode(raw)?))
  }
}
