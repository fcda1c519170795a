//! S3-compatible object store backend.
//!
//! Requests are signed with SigV4 and sent path-style
//! (`{endpoint}/{bucket}/{key}`), which works against AWS as well as MinIO
//! and other compatible servers.

mod config;
mod signer;
mod xml;

pub use config::S3Config;

use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt;
use reqwest::{Method, RequestBuilder};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{ByteStream, ObjectLocator, ObjectStore, ObjectStoreError, TagSet, annotate};
use signer::Signer;

const BACKEND: &str = "s3";

const MAX_TAGS: usize = 10;
const MAX_TAG_KEY_CHARS: usize = 128;
const MAX_TAG_VALUE_CHARS: usize = 256;

/// A configured connection, built once and reused for every call.
struct S3Client {
  http: reqwest::Client,
  /// `scheme://host[:port]`
  base_url: String,
  signer: Signer,
  max_put_bytes: usize,
}

/// Why a request did not succeed.
enum CallError {
  Cancelled,
  Remote(String),
}

/// Object store backed by S3 or an S3-compatible server.
///
/// A store built without credentials stays usable as a value but rejects
/// every call with [`ObjectStoreError::NotConfigured`].
pub struct S3Store {
  client: Option<S3Client>,
}

impl S3Store {
  pub fn new(config: S3Config) -> Result<Self, ObjectStoreError> {
    let endpoint = config.endpoint_url()?;
    let base_url = match (endpoint.host_str(), endpoint.port()) {
      (Some(host), Some(port)) => format!("{}://{}:{}", endpoint.scheme(), host, port),
      (Some(host), None) => format!("{}://{}", endpoint.scheme(), host),
      (None, _) => {
        return Err(ObjectStoreError::InvalidConfig {
          backend: BACKEND,
          message: "endpoint has no host".to_string(),
        });
      }
    };

    let http = reqwest::Client::builder()
      .timeout(Duration::from_millis(config.request_timeout_ms))
      .build()
      .map_err(|e| ObjectStoreError::InvalidConfig {
        backend: BACKEND,
        message: format!("failed to build http client: {}", e),
      })?;

    info!(
      region = %config.region,
      endpoint = %endpoint,
      "s3_client_initialized"
    );

    Ok(Self {
      client: Some(S3Client {
        http,
        base_url,
        signer: Signer::new(
          config.region,
          config.access_key,
          config.secret_key,
          config.session_token,
        ),
        max_put_bytes: config.max_put_bytes,
      }),
    })
  }

  /// A store with no client. Every call fails with `NotConfigured`.
  pub fn unconfigured() -> Self {
    Self { client: None }
  }

  /// Build from the standard AWS environment variables, or an unconfigured
  /// store if no credentials are set.
  pub fn from_env() -> Result<Self, ObjectStoreError> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// As [`Self::from_env`], reading variables through `lookup`.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ObjectStoreError> {
    match S3Config::from_lookup(lookup) {
      Some(config) => Self::new(config),
      None => {
        warn!("s3_credentials_missing");
        Ok(Self::unconfigured())
      }
    }
  }

  pub fn is_configured(&self) -> bool {
    self.client.is_some()
  }

  fn client(&self) -> Result<&S3Client, ObjectStoreError> {
    self
      .client
      .as_ref()
      .ok_or(ObjectStoreError::NotConfigured { backend: BACKEND })
  }

  async fn tag_inner(
    &self,
    locator: &ObjectLocator,
    tags: &TagSet,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError> {
    let client = self.client()?;
    locator.validate()?;
    check_tag_limits(tags)?;

    let body = xml::tagging(tags)?.into_bytes();
    let checksum = BASE64.encode(Sha256::digest(&body));
    let headers = [
      ("content-type", "application/xml"),
      ("x-amz-checksum-sha256", checksum.as_str()),
    ];

    let request = client.signed(Method::PUT, locator, Some("tagging"), &headers, body)?;
    client
      .send(request, cancel)
      .await
      .map_err(|e| match e {
        CallError::Cancelled => ObjectStoreError::Cancelled,
        CallError::Remote(message) => ObjectStoreError::RemoteTagFailure {
          operation: "PutObjectTagging",
          bucket: locator.bucket.clone(),
          key: locator.key.clone(),
          message,
        },
      })
  }

  async fn put_inner(
    &self,
    locator: &ObjectLocator,
    data: ByteStream,
    content_type: &str,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError> {
    let client = self.client()?;
    locator.validate()?;

    // PutObject needs a Content-Length up front, so the body is collected,
    // bounded by `max_put_bytes`.
    let mut body = Vec::new();
    let mut stream = std::pin::pin!(data);
    while let Some(chunk) = stream.next().await {
      if cancel.is_cancelled() {
        return Err(ObjectStoreError::Cancelled);
      }
      let chunk = chunk?;
      if body.len() + chunk.len() > client.max_put_bytes {
        return Err(ObjectStoreError::ObjectTooLarge {
          bucket: locator.bucket.clone(),
          key: locator.key.clone(),
          limit: client.max_put_bytes,
        });
      }
      body.extend_from_slice(&chunk);
    }

    let headers = [("content-type", content_type)];
    let request = client.signed(Method::PUT, locator, None, &headers, body)?;
    client
      .send(request, cancel)
      .await
      .map_err(|e| match e {
        CallError::Cancelled => ObjectStoreError::Cancelled,
        CallError::Remote(message) => ObjectStoreError::RemoteWriteFailure {
          operation: "PutObject",
          bucket: locator.bucket.clone(),
          key: locator.key.clone(),
          message,
        },
      })
  }
}

impl S3Client {
  /// Build a signed request for an object.
  ///
  /// `subresource` is a valueless query parameter such as `tagging`.
  fn signed(
    &self,
    method: Method,
    locator: &ObjectLocator,
    subresource: Option<&str>,
    headers: &[(&str, &str)],
    body: Vec<u8>,
  ) -> Result<RequestBuilder, ObjectStoreError> {
    let mut url = format!(
      "{}{}",
      self.base_url,
      signer::object_path(&locator.bucket, &locator.key)
    );
    if let Some(subresource) = subresource {
      url.push('?');
      url.push_str(subresource);
    }

    let signature = self
      .signer
      .sign(method.as_str(), &url, headers, &body, SystemTime::now())?;

    let mut request = self.http.request(method, url);
    for (name, value) in headers {
      request = request.header(*name, *value);
    }
    for (name, value) in signature {
      request = request.header(name, value);
    }
    Ok(request.body(body))
  }

  async fn send(&self, request: RequestBuilder, cancel: &CancellationToken) -> Result<(), CallError> {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(CallError::Cancelled),
      result = execute(request) => result,
    }
  }
}

async fn execute(request: RequestBuilder) -> Result<(), CallError> {
  let response = request
    .send()
    .await
    .map_err(|e| CallError::Remote(e.to_string()))?;
  let status = response.status();
  if status.is_success() {
    return Ok(());
  }
  let body = response.text().await.unwrap_or_default();
  Err(CallError::Remote(match xml::error_code(&body) {
    Some(code) => format!("status {}: {}", status, code),
    None => format!("status {}", status),
  }))
}

#[async_trait]
impl ObjectStore for S3Store {
  fn backend(&self) -> &'static str {
    BACKEND
  }

  #[instrument(
    name = "s3_put",
    skip(self, data, cancel),
    fields(bucket = %locator.bucket, key = %locator.key)
  )]
  async fn put(
    &self,
    locator: &ObjectLocator,
    data: ByteStream,
    content_type: &str,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError> {
    let result = self.put_inner(locator, data, content_type, cancel).await;
    annotate(BACKEND, "put", locator, result)
  }

  #[instrument(
    name = "s3_tag",
    skip(self, tags, cancel),
    fields(bucket = %locator.bucket, key = %locator.key, tags = tags.len())
  )]
  async fn tag(
    &self,
    locator: &ObjectLocator,
    tags: &TagSet,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError> {
    let result = self.tag_inner(locator, tags, cancel).await;
    annotate(BACKEND, "tag", locator, result)
  }
}

fn check_tag_limits(tags: &TagSet) -> Result<(), ObjectStoreError> {
  if tags.len() > MAX_TAGS {
    return Err(ObjectStoreError::InvalidTagSet {
      reason: format!("{} tags given, at most {} allowed", tags.len(), MAX_TAGS),
    });
  }

  let mut seen = HashSet::new();
  for tag in tags {
    let key_chars = tag.key.chars().count();
    if key_chars == 0 || key_chars > MAX_TAG_KEY_CHARS {
      return Err(ObjectStoreError::InvalidTagSet {
        reason: format!(
          "tag key '{}' must be 1 to {} characters",
          tag.key, MAX_TAG_KEY_CHARS
        ),
      });
    }
    if tag.value.chars().count() > MAX_TAG_VALUE_CHARS {
      return Err(ObjectStoreError::InvalidTagSet {
        reason: format!(
          "value of tag '{}' exceeds {} characters",
          tag.key, MAX_TAG_VALUE_CHARS
        ),
      });
    }
    if !seen.insert(tag.key.as_str()) {
      return Err(ObjectStoreError::InvalidTagSet {
        reason: format!("duplicate tag key '{}'", tag.key),
      });
    }
  }
  Ok(())
}
