//! Strata Object Store
//!
//! This crate provides the object store trait used to write artifact bytes
//! and to tag the stored objects with provenance metadata, together with its
//! backends.
//!
//! The [`ObjectStore`] trait is all the resolution and runtime layers depend
//! on. Each backend ([`S3Store`], [`FsStore`]) builds its client once from its
//! own configuration and reuses it across calls. Before any remote call a
//! backend checks that it is configured and that the [`ObjectLocator`] names
//! both a bucket and a key, so malformed requests never leave the process.

mod error;
mod fs;
mod locator;
mod s3;
mod tags;

pub use error::ObjectStoreError;
pub use fs::FsStore;
pub use locator::ObjectLocator;
pub use s3::{S3Config, S3Store};
pub use tags::{
  ARTIFACT_NAME_TAG, ARTIFACT_TYPE_TAG, OUTPUT_KEY_TAG, PRODUCER_TASK_TAG, Tag, TagSet,
};

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use strata_metadata::RuntimeArtifact;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// A boxed stream of bytes for object data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ObjectStoreError>> + Send>>;

/// Build a [`ByteStream`] from an in-memory buffer.
pub fn byte_stream(data: impl Into<Bytes>) -> ByteStream {
  Box::pin(futures::stream::iter([Ok(data.into())]))
}

/// Object storage trait.
///
/// Implementations provide a storage backend (S3, filesystem, ...). Calls are
/// stateless; retrying is the caller's decision (see
/// [`ObjectStoreError::is_transient`]).
#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// Backend name used in logs and errors.
  fn backend(&self) -> &'static str;

  /// Store an object.
  async fn put(
    &self,
    locator: &ObjectLocator,
    data: ByteStream,
    content_type: &str,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError>;

  /// Replace the tag set of an existing object.
  ///
  /// Idempotent: tagging again with the same set is safe to retry.
  async fn tag(
    &self,
    locator: &ObjectLocator,
    tags: &TagSet,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError>;
}

/// Tag the object backing a resolved artifact with its lineage.
///
/// The object is located from the artifact URI.
pub async fn tag_lineage(
  store: &dyn ObjectStore,
  task_name: &str,
  output_key: &str,
  artifact: &RuntimeArtifact,
  cancel: &CancellationToken,
) -> Result<TagSet, ObjectStoreError> {
  let locator = ObjectLocator::from_uri(&artifact.uri)?;
  let tags = TagSet::lineage(task_name, output_key, artifact);
  store.tag(&locator, &tags, cancel).await?;
  Ok(tags)
}

/// Log the outcome of a store call.
///
/// Every backend funnels its results through here so each call produces
/// exactly one event, whichever path it exits on.
pub(crate) fn annotate<T>(
  backend: &'static str,
  operation: &'static str,
  locator: &ObjectLocator,
  result: Result<T, ObjectStoreError>,
) -> Result<T, ObjectStoreError> {
  match &result {
    Ok(_) => {
      debug!(
        backend,
        operation,
        bucket = %locator.bucket,
        key = %locator.key,
        "object_store_call_succeeded"
      );
    }
    Err(e) => {
      error!(
        backend,
        operation,
        bucket = %locator.bucket,
        key = %locator.key,
        error = %e,
        transient = e.is_transient(),
        "object_store_call_failed"
      );
    }
  }
  result
}
