use bytes::Bytes;
use futures::{StreamExt, stream};
use strata_objectstore::{
  ByteStream, FsStore, ObjectLocator, ObjectStore, ObjectStoreError, TagSet, byte_stream,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn chunked(chunks: &[&'static str]) -> ByteStream {
  let items: Vec<Result<Bytes, ObjectStoreError>> =
    chunks.iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
  Box::pin(stream::iter(items))
}

#[tokio::test]
async fn test_put_then_tag() {
  let dir = TempDir::new().unwrap();
  let store = FsStore::new(dir.path());
  let locator = ObjectLocator::new("ml-artifacts", "runs/7/model.pt");
  let cancel = CancellationToken::new();

  store
    .put(&locator, chunked(&["hello ", "world"]), "application/octet-stream", &cancel)
    .await
    .unwrap();

  let written = std::fs::read_to_string(dir.path().join("ml-artifacts/runs/7/model.pt")).unwrap();
  assert_eq!(written, "hello world");

  assert!(store.tags(&locator).await.unwrap().is_empty());

  let tags = TagSet::new().with("team", "vision");
  store.tag(&locator, &tags, &cancel).await.unwrap();
  assert_eq!(store.tags(&locator).await.unwrap(), tags);
}

#[tokio::test]
async fn test_tag_replaces_previous_set() {
  let dir = TempDir::new().unwrap();
  let store = FsStore::new(dir.path());
  let locator = ObjectLocator::new("b", "k");
  let cancel = CancellationToken::new();

  store
    .put(&locator, byte_stream("x"), "text/plain", &cancel)
    .await
    .unwrap();

  let first = TagSet::new().with("a", "1").with("b", "2");
  let second = TagSet::new().with("c", "3");
  store.tag(&locator, &first, &cancel).await.unwrap();
  store.tag(&locator, &second, &cancel).await.unwrap();
  store.tag(&locator, &second, &cancel).await.unwrap();

  assert_eq!(store.tags(&locator).await.unwrap(), second);
}

#[tokio::test]
async fn test_tag_missing_object() {
  let dir = TempDir::new().unwrap();
  let store = FsStore::new(dir.path());

  let err = store
    .tag(
      &ObjectLocator::new("b", "absent"),
      &TagSet::new().with("a", "1"),
      &CancellationToken::new(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_invalid_locator() {
  let dir = TempDir::new().unwrap();
  let store = FsStore::new(dir.path());

  let err = store
    .tag(&ObjectLocator::new("b", ""), &TagSet::new(), &CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::InvalidLocator { .. }));
}

#[tokio::test]
async fn test_cancelled_tag() {
  let dir = TempDir::new().unwrap();
  let store = FsStore::new(dir.path());
  let locator = ObjectLocator::new("b", "k");
  let cancel = CancellationToken::new();

  store
    .put(&locator, byte_stream("x"), "text/plain", &cancel)
    .await
    .unwrap();

  cancel.cancel();
  let err = store
    .tag(&locator, &TagSet::new().with("a", "1"), &cancel)
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::Cancelled));
  assert!(store.tags(&locator).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_put_rejects_keys_outside_the_store() {
  let root = TempDir::new().unwrap();
  let store_dir = root.path().join("store");
  let store = FsStore::new(&store_dir);
  let cancel = CancellationToken::new();

  let outside = root.path().join("stolen.txt");
  let absolute = format!("s3://bucket/{}", outside.display());
  assert!(matches!(
    ObjectLocator::from_uri(&absolute),
    Err(ObjectStoreError::InvalidLocator { .. })
  ));

  for locator in [
    ObjectLocator::new("bucket", outside.display().to_string()),
    ObjectLocator::new("..", "../escaped.txt"),
    ObjectLocator::new("bucket", "../../escaped.txt"),
  ] {
    let err = store
      .put(&locator, byte_stream("x"), "text/plain", &cancel)
      .await
      .unwrap_err();
    assert!(matches!(err, ObjectStoreError::InvalidLocator { .. }));

    let err = store
      .tag(&locator, &TagSet::new().with("a", "1"), &cancel)
      .await
      .unwrap_err();
    assert!(matches!(err, ObjectStoreError::InvalidLocator { .. }));
  }

  assert!(!outside.exists());
  assert!(!root.path().join("escaped.txt").exists());
  assert!(!store_dir.exists());
}

#[tokio::test]
async fn test_cancelled_put_leaves_no_object() {
  let dir = TempDir::new().unwrap();
  let store = FsStore::new(dir.path());
  let locator = ObjectLocator::new("b", "k");
  let cancel = CancellationToken::new();

  let trigger = cancel.clone();
  let data: ByteStream = Box::pin(stream::iter(["first", "second"]).map(move |chunk| {
    trigger.cancel();
    Ok(Bytes::from_static(chunk.as_bytes()))
  }));

  let err = store
    .put(&locator, data, "text/plain", &cancel)
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::Cancelled));

  let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("b")).unwrap().collect();
  assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);

  let err = store
    .tag(&locator, &TagSet::new().with("a", "1"), &CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_failed_put_keeps_previous_object() {
  let dir = TempDir::new().unwrap();
  let store = FsStore::new(dir.path());
  let locator = ObjectLocator::new("b", "k");
  let cancel = CancellationToken::new();

  store
    .put(&locator, byte_stream("complete"), "text/plain", &cancel)
    .await
    .unwrap();

  let items: Vec<Result<Bytes, ObjectStoreError>> = vec![
    Ok(Bytes::from_static(b"trunc")),
    Err(ObjectStoreError::Io(std::io::Error::other("stream broke"))),
  ];
  let err = store
    .put(&locator, Box::pin(stream::iter(items)), "text/plain", &cancel)
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::Io(_)));

  let content = std::fs::read_to_string(dir.path().join("b/k")).unwrap();
  assert_eq!(content, "complete");
  assert_eq!(std::fs::read_dir(dir.path().join("b")).unwrap().count(), 1);
}
