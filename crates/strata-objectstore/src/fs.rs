use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::{ByteStream, ObjectLocator, ObjectStore, ObjectStoreError, TagSet, annotate};

const BACKEND: &str = "fs";

static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem-based object store.
///
/// Stores each object at `{base_path}/{bucket}/{key}`. Parent directories are
/// created automatically. Tags live in a sidecar file next to the object,
/// `{key}.tags.json`, rewritten whole on every tag call.
pub struct FsStore {
  base_path: PathBuf,
}

impl FsStore {
  /// Create a new filesystem store with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  fn object_path(&self, locator: &ObjectLocator) -> PathBuf {
    self.base_path.join(&locator.bucket).join(&locator.key)
  }

  fn tags_path(&self, locator: &ObjectLocator) -> PathBuf {
    let mut path = self.object_path(locator).into_os_string();
    path.push(".tags.json");
    PathBuf::from(path)
  }

  /// Read the tags of an object. Untagged objects have an empty set.
  pub async fn tags(&self, locator: &ObjectLocator) -> Result<TagSet, ObjectStoreError> {
    locator.validate()?;
    match fs::read(self.tags_path(locator)).await {
      Ok(content) => serde_json::from_slice(&content)
        .map_err(|e| ObjectStoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TagSet::new()),
      Err(e) => Err(ObjectStoreError::Io(e)),
    }
  }

  async fn put_inner(
    &self,
    locator: &ObjectLocator,
    data: ByteStream,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError> {
    locator.validate()?;
    let path = self.object_path(locator);

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    // Readers only ever see a complete object: bytes go to a sibling file
    // that is renamed over the key once the stream is exhausted.
    let partial = partial_path(&path);
    let written = match write_stream(&partial, data, cancel).await {
      Ok(()) => fs::rename(&partial, &path).await.map_err(ObjectStoreError::from),
      Err(e) => Err(e),
    };
    if written.is_err() {
      let _ = fs::remove_file(&partial).await;
    }
    written
  }

  async fn tag_inner(
    &self,
    locator: &ObjectLocator,
    tags: &TagSet,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError> {
    locator.validate()?;
    if cancel.is_cancelled() {
      return Err(ObjectStoreError::Cancelled);
    }

    if !fs::try_exists(self.object_path(locator)).await? {
      return Err(ObjectStoreError::NotFound {
        bucket: locator.bucket.clone(),
        key: locator.key.clone(),
      });
    }

    let content = serde_json::to_vec_pretty(tags)
      .map_err(|e| ObjectStoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    fs::write(self.tags_path(locator), content).await?;
    Ok(())
  }
}

fn partial_path(path: &Path) -> PathBuf {
  let id = PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed);
  let name = path.file_name().unwrap_or_default().to_string_lossy();
  path.with_file_name(format!(".{}.{}-{}.partial", name, std::process::id(), id))
}

async fn write_stream(
  path: &Path,
  data: ByteStream,
  cancel: &CancellationToken,
) -> Result<(), ObjectStoreError> {
  let mut file = File::create(path).await?;
  let mut stream = std::pin::pin!(data);

  while let Some(chunk) = stream.next().await {
    if cancel.is_cancelled() {
      return Err(ObjectStoreError::Cancelled);
    }
    let bytes = chunk?;
    file.write_all(&bytes).await?;
  }

  file.flush().await?;
  Ok(())
}

#[async_trait]
impl ObjectStore for FsStore {
  fn backend(&self) -> &'static str {
    BACKEND
  }

  async fn put(
    &self,
    locator: &ObjectLocator,
    data: ByteStream,
    _content_type: &str,
    cancel: &CancellationToken,
  ) -> Result<(), ObjectStoreError> {
    let result = self.put_inner(locator, data, cancel).await;
    annotate(BACKEND, "put", locator, result)
  }

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
