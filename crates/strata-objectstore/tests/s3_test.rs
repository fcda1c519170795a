//! S3 backend tests against a mock S3 endpoint.

use std::time::Duration;

use bytes::Bytes;
use futures::stream;
use sha2::{Digest, Sha256};
use strata_metadata::{ArtifactSchema, RuntimeArtifact};
use strata_objectstore::{
  ByteStream, ObjectLocator, ObjectStore, ObjectStoreError, PRODUCER_TASK_TAG, S3Config, S3Store, TagSet,
  byte_stream, tag_lineage,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, header_exists, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "wJalrXUtnFEMI-test-secret";

fn store_for(server: &MockServer) -> S3Store {
  let config = S3Config::new("us-east-1", "AKIDTEST", SECRET).with_endpoint(server.uri());
  S3Store::new(config).unwrap()
}

fn team_tags() -> TagSet {
  TagSet::new().with("team", "vision").with("stage", "prod")
}

const TEAM_TAGS_XML: &str = "<Tagging><TagSet>\
  <Tag><Key>team</Key><Value>vision</Value></Tag>\
  <Tag><Key>stage</Key><Value>prod</Value></Tag>\
  </TagSet></Tagging>";

#[tokio::test]
async fn test_tag_sends_signed_put_object_tagging() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/ml-artifacts/runs/7/model.pt"))
    .and(query_param("tagging", ""))
    .and(header("content-type", "application/xml"))
    .and(header_exists("x-amz-checksum-sha256"))
    .and(header_exists("x-amz-content-sha256"))
    .and(header_regex(
      "authorization",
      r"^AWS4-HMAC-SHA256 Credential=AKIDTEST/\d{8}/us-east-1/s3/aws4_request, SignedHeaders=content-type;host;[a-z0-9;-]*x-amz-checksum-sha256;[a-z0-9;-]*, Signature=[0-9a-f]{64}$",
    ))
    .and(body_string(TEAM_TAGS_XML))
    .respond_with(ResponseTemplate::new(200))
    .expect(1)
    .mount(&server)
    .await;

  let store = store_for(&server);
  let locator = ObjectLocator::new("ml-artifacts", "runs/7/model.pt");

  store
    .tag(&locator, &team_tags(), &CancellationToken::new())
    .await
    .unwrap();
}

#[tokio::test]
async fn test_tag_twice_is_idempotent() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/bucket/key"))
    .and(query_param("tagging", ""))
    .and(body_string(TEAM_TAGS_XML))
    .respond_with(ResponseTemplate::new(200))
    .expect(2)
    .mount(&server)
    .await;

  let store = store_for(&server);
  let locator = ObjectLocator::new("bucket", "key");
  let cancel = CancellationToken::new();

  store.tag(&locator, &team_tags(), &cancel).await.unwrap();
  store.tag(&locator, &team_tags(), &cancel).await.unwrap();
}

#[tokio::test]
async fn test_invalid_locator_makes_no_request() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;

  let store = store_for(&server);
  let cancel = CancellationToken::new();

  for locator in [ObjectLocator::new("", "key"), ObjectLocator::new("bucket", "")] {
    let err = store.tag(&locator, &team_tags(), &cancel).await.unwrap_err();
    assert!(
      matches!(err, ObjectStoreError::InvalidLocator { .. }),
      "unexpected error: {}",
      err
    );
  }
}

#[tokio::test]
async fn test_oversized_tag_set_makes_no_request() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;

  let store = store_for(&server);
  let tags: TagSet = (0..11).map(|i| (format!("k{}", i), "v")).collect();

  let err = store
    .tag(&ObjectLocator::new("b", "k"), &tags, &CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::InvalidTagSet { .. }));
}

#[tokio::test]
async fn test_unconfigured_store_rejects_calls() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;

  // An endpoint without credentials leaves the store unconfigured.
  let endpoint = server.uri();
  let store = S3Store::from_lookup(|name| match name {
    "AWS_ENDPOINT_URL" => Some(endpoint.clone()),
    "AWS_REGION" => Some("us-east-1".to_string()),
    _ => None,
  })
  .unwrap();
  assert!(!store.is_configured());
  let cancel = CancellationToken::new();

  let err = store
    .tag(&ObjectLocator::new("b", "k"), &team_tags(), &cancel)
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::NotConfigured { backend: "s3" }));
  assert!(!err.is_transient());

  let err = store
    .put(&ObjectLocator::new("b", "k"), byte_stream("x"), "text/plain", &cancel)
    .await
    .unwrap_err();
  assert!(matches!(err, ObjectStoreError::NotConfigured { .. }));

  server.verify().await;
}

#[tokio::test]
async fn test_remote_rejection_is_reported_without_secrets() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/bucket/key"))
    .respond_with(ResponseTemplate::new(403).set_body_string(
      "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
       <Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
    ))
    .mount(&server)
    .await;

  let store = store_for(&server);
  let err = store
    .tag(&ObjectLocator::new("bucket", "key"), &team_tags(), &CancellationToken::new())
    .await
    .unwrap_err();

  match &err {
    ObjectStoreError::RemoteTagFailure {
      operation,
      bucket,
      key,
      message,
    } => {
      assert_eq!(*operation, "PutObjectTagging");
      assert_eq!(bucket, "bucket");
      assert_eq!(key, "key");
      assert!(message.contains("403"));
      assert!(message.contains("AccessDenied"));
    }
    other => panic!("unexpected error: {}", other),
  }
  assert!(err.is_transient());
  let rendered = err.to_string();
  assert!(rendered.contains("failed to add tags"));
  assert!(!rendered.contains(SECRET));
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
    .mount(&server)
    .await;

  let store = store_for(&server);
  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.cancel();
  });

  let err = tokio::time::timeout(
    Duration::from_secs(5),
    store.tag(&ObjectLocator::new("bucket", "key"), &team_tags(), &cancel),
  )
  .await
  .expect("cancellation should end the call")
  .unwrap_err();
  assert!(matches!(err, ObjectStoreError::Cancelled));
}

#[tokio::test]
async fn test_put_object() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/bucket/data/metrics.json"))
    .and(header("content-type", "application/json"))
    .and(body_string("{\"accuracy\":0.9}"))
    .respond_with(ResponseTemplate::new(200))
    .expect(1)
    .mount(&server)
    .await;

  let store = store_for(&server);
  store
    .put(
      &ObjectLocator::new("bucket", "data/metrics.json"),
      byte_stream("{\"accuracy\":0.9}"),
      "application/json",
      &CancellationToken::new(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_put_multi_chunk_object() {
  let chunks = ["model-", "weights-", "part-3"];
  let content = chunks.concat();

  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/bucket/runs/7/model.pt"))
    .and(header(
      "x-amz-content-sha256",
      format!("{:x}", Sha256::digest(content.as_bytes())).as_str(),
    ))
    .and(header("content-length", content.len().to_string().as_str()))
    .and(body_string(content.clone()))
    .respond_with(ResponseTemplate::new(200))
    .expect(1)
    .mount(&server)
    .await;

  let items: Vec<Result<Bytes, ObjectStoreError>> = chunks
    .iter()
    .map(|c| Ok(Bytes::from_static(c.as_bytes())))
    .collect();
  let data: ByteStream = Box::pin(stream::iter(items));

  let store = store_for(&server);
  store
    .put(
      &ObjectLocator::new("bucket", "runs/7/model.pt"),
      data,
      "application/octet-stream",
      &CancellationToken::new(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_put_over_size_limit_makes_no_request() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;

  let config = S3Config::new("us-east-1", "AKIDTEST", SECRET)
    .with_endpoint(server.uri())
    .with_max_put_bytes(8);
  let store = S3Store::new(config).unwrap();

  let items: Vec<Result<Bytes, ObjectStoreError>> = vec![
    Ok(Bytes::from_static(b"12345")),
    Ok(Bytes::from_static(b"67890")),
  ];
  let err = store
    .put(
      &ObjectLocator::new("bucket", "key"),
      Box::pin(stream::iter(items)),
      "text/plain",
      &CancellationToken::new(),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    ObjectStoreError::ObjectTooLarge { limit: 8, .. }
  ));
  assert!(!err.is_transient());
}

#[tokio::test]
async fn test_put_failure_is_a_write_failure() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .respond_with(ResponseTemplate::new(500))
    .mount(&server)
    .await;

  let store = store_for(&server);
  let err = store
    .put(
      &ObjectLocator::new("bucket", "key"),
      byte_stream("x"),
      "text/plain",
      &CancellationToken::new(),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    ObjectStoreError::RemoteWriteFailure { operation: "PutObject", .. }
  ));
}

#[tokio::test]
async fn test_tag_lineage_locates_object_from_uri() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/ml-artifacts/runs/7/model"))
    .and(query_param("tagging", ""))
    .respond_with(ResponseTemplate::new(200))
    .expect(1)
    .mount(&server)
    .await;

  let store = store_for(&server);
  let artifact = RuntimeArtifact {
    name: "42".to_string(),
    artifact_type: ArtifactSchema::SchemaTitle("system.Model".to_string()),
    uri: "s3://ml-artifacts/runs/7/model".to_string(),
    metadata: Default::default(),
  };

  let tags = tag_lineage(&store, "train", "out_model", &artifact, &CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(tags.get(PRODUCER_TASK_TAG), Some("train"));
}
