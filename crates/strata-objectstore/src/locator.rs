use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ObjectStoreError;

/// URI schemes recognised by [`ObjectLocator::from_uri`].
const SCHEMES: &[&str] = &["s3", "minio", "gs", "file"];

/// Identifies an object: the bucket (or container) and the key inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocator {
  pub bucket: String,
  pub key: String,
}

impl ObjectLocator {
  pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
    Self {
      bucket: bucket.into(),
      key: key.into(),
    }
  }

  /// Parse an artifact URI such as `s3://bucket/path/to/object`.
  pub fn from_uri(uri: &str) -> Result<Self, ObjectStoreError> {
    let (scheme, rest) = uri
      .split_once("://")
      .ok_or_else(|| ObjectStoreError::InvalidLocator {
        reason: format!("'{}' is not a URI", uri),
      })?;

    if !SCHEMES.contains(&scheme) {
      return Err(ObjectStoreError::InvalidLocator {
        reason: format!("unsupported scheme '{}' in '{}'", scheme, uri),
      });
    }

    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    let locator = Self::new(bucket, key);
    locator.validate()?;
    Ok(locator)
  }

  /// Check that bucket and key are both present and stay inside the bucket.
  ///
  /// The bucket is a single path segment. The key is relative, and none of its
  /// `/`-separated segments is empty, `.` or `..`.
  pub fn validate(&self) -> Result<(), ObjectStoreError> {
    if self.bucket.is_empty() {
      return Err(invalid("bucket name is not set".to_string()));
    }
    if self.key.is_empty() {
      return Err(invalid(format!(
        "object key is not set for bucket '{}'",
        self.bucket
      )));
    }
    if matches!(self.bucket.as_str(), "." | "..") || self.bucket.contains(['/', '\\']) {
      return Err(invalid(format!(
        "bucket name '{}' is not a single path segment",
        self.bucket
      )));
    }
    if self.key.starts_with('/') {
      return Err(invalid(format!("object key '{}' must be relative", self.key)));
    }
    if self
      .key
      .split('/')
      .any(|segment| matches!(segment, "" | "." | ".."))
    {
      return Err(invalid(format!(
        "object key '{}' has an empty, '.' or '..' segment",
        self.key
      )));
    }
    Ok(())
  }
}

fn invalid(reason: String) -> ObjectStoreError {
  ObjectStoreError::InvalidLocator { reason }
}

impl fmt::Display for ObjectLocator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.bucket, self.key)
  }
}
