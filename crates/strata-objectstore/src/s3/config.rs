use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ObjectStoreError;

fn default_request_timeout_ms() -> u64 {
  30_000
}

/// Largest object `put` buffers and sends in a single request (256 MiB).
const DEFAULT_MAX_PUT_BYTES: usize = 256 * 1024 * 1024;

fn default_max_put_bytes() -> usize {
  DEFAULT_MAX_PUT_BYTES
}

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
  pub region: String,
  /// Custom endpoint (MinIO, Ceph, ...). Defaults to AWS for the region.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub endpoint: Option<String>,
  pub access_key: String,
  pub secret_key: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_token: Option<String>,
  #[serde(default = "default_request_timeout_ms")]
  pub request_timeout_ms: u64,
  /// Upper bound on the size of an object written with `put`.
  #[serde(default = "default_max_put_bytes")]
  pub max_put_bytes: usize,
}

impl S3Config {
  pub fn new(
    region: impl Into<String>,
    access_key: impl Into<String>,
    secret_key: impl Into<String>,
  ) -> Self {
    Self {
      region: region.into(),
      endpoint: None,
      access_key: access_key.into(),
      secret_key: secret_key.into(),
      session_token: None,
      request_timeout_ms: default_request_timeout_ms(),
      max_put_bytes: default_max_put_bytes(),
    }
  }

  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = Some(endpoint.into());
    self
  }

  pub fn with_max_put_bytes(mut self, max_put_bytes: usize) -> Self {
    self.max_put_bytes = max_put_bytes;
    self
  }

  /// Read the standard AWS environment variables.
  ///
  /// Returns `None` when no credentials are set.
  pub fn from_env() -> Option<Self> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Build from a variable lookup, using the same names as [`Self::from_env`].
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

    let access_key = non_empty("AWS_ACCESS_KEY_ID")?;
    let secret_key = non_empty("AWS_SECRET_ACCESS_KEY")?;
    let region = non_empty("AWS_REGION")
      .or_else(|| non_empty("AWS_DEFAULT_REGION"))
      .unwrap_or_else(|| "us-east-1".to_string());

    Some(Self {
      region,
      endpoint: non_empty("AWS_ENDPOINT_URL"),
      access_key,
      secret_key,
      session_token: non_empty("AWS_SESSION_TOKEN"),
      request_timeout_ms: default_request_timeout_ms(),
      max_put_bytes: default_max_put_bytes(),
    })
  }

  /// The endpoint requests are sent to.
  pub(crate) fn endpoint_url(&self) -> Result<Url, ObjectStoreError> {
    let raw = match &self.endpoint {
      Some(endpoint) => endpoint.clone(),
      None => format!("https://s3.{}.amazonaws.com", self.region),
    };
    let url = Url::parse(&raw).map_err(|e| ObjectStoreError::InvalidConfig {
      backend: "s3",
      message: format!("invalid endpoint '{}': {}", raw, e),
    })?;
    if url.host_str().is_none() || !matches!(url.scheme(), "http" | "https") {
      return Err(ObjectStoreError::InvalidConfig {
        backend: "s3",
        message: format!("endpoint '{}' must be an http(s) URL with a host", raw),
      });
    }
    Ok(url)
  }
}

impl fmt::Debug for S3Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("S3Config")
      .field("region", &self.region)
      .field("endpoint", &self.endpoint)
      .field("access_key", &self.access_key)
      .field("secret_key", &"<redacted>")
      .field(
        "session_token",
        &self.session_token.as_ref().map(|_| "<redacted>"),
      )
      .field("request_timeout_ms", &self.request_timeout_ms)
      .field("max_put_bytes", &self.max_put_bytes)
      .finish()
  }
}
