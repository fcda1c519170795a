//! Concrete artifacts and their runtime descriptors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::property::PropertyValue;

/// Type of an artifact: either a well-known schema title such as
/// `system.Model`, or an inline instance schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactSchema {
  SchemaTitle(String),
  InstanceSchema(String),
}

impl ArtifactSchema {
  fn is_blank(&self) -> bool {
    match self {
      ArtifactSchema::SchemaTitle(s) | ArtifactSchema::InstanceSchema(s) => s.trim().is_empty(),
    }
  }
}

/// An artifact record in the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
  pub id: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default)]
  pub uri: String,
  /// Schema title of the artifact type, e.g. `system.Dataset`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub type_name: Option<String>,
  #[serde(default)]
  pub custom_properties: HashMap<String, PropertyValue>,
}

/// An artifact produced by a leaf execution under one output key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputArtifact {
  /// Output key the artifact was produced under.
  pub name: String,
  pub artifact: Artifact,
  /// Inline instance schema; takes precedence over the artifact's type name.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schema: Option<String>,
}

/// Failure converting an [`OutputArtifact`] into a [`RuntimeArtifact`].
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
  #[error("artifact {artifact_id} has no type schema")]
  MissingType { artifact_id: i64 },

  #[error("property '{property}' of artifact {artifact_id} is not representable as JSON")]
  UnrepresentableProperty { artifact_id: i64, property: String },
}

/// The resolved, concrete representation of an artifact handed to consumers.
///
/// Metadata keys are kept sorted so equal artifacts serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeArtifact {
  pub name: String,
  #[serde(rename = "type")]
  pub artifact_type: ArtifactSchema,
  pub uri: String,
  #[serde(default)]
  pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl OutputArtifact {
  pub fn new(name: impl Into<String>, artifact: Artifact) -> Self {
    Self {
      name: name.into(),
      artifact,
      schema: None,
    }
  }

  /// Convert to the runtime descriptor exposed outside the metadata layer.
  pub fn to_runtime_artifact(&self) -> Result<RuntimeArtifact, ConversionError> {
    let artifact = &self.artifact;

    let artifact_type = match (&self.schema, &artifact.type_name) {
      (Some(schema), _) => ArtifactSchema::InstanceSchema(schema.clone()),
      (None, Some(title)) => ArtifactSchema::SchemaTitle(title.clone()),
      (None, None) => {
        return Err(ConversionError::MissingType {
          artifact_id: artifact.id,
        });
      }
    };
    if artifact_type.is_blank() {
      return Err(ConversionError::MissingType {
        artifact_id: artifact.id,
      });
    }

    let mut keys: Vec<&String> = artifact.custom_properties.keys().collect();
    keys.sort();

    let mut metadata = serde_json::Map::new();
    for key in keys {
      let value = artifact.custom_properties[key].to_json().ok_or_else(|| {
        ConversionError::UnrepresentableProperty {
          artifact_id: artifact.id,
          property: key.clone(),
        }
      })?;
      metadata.insert(key.clone(), value);
    }

    Ok(RuntimeArtifact {
      name: artifact
        .name
        .clone()
        .unwrap_or_else(|| artifact.id.to_string()),
      artifact_type,
      uri: artifact.uri.clone(),
      metadata,
    })
  }
}
