//! S3 XML request and response bodies.

use serde::{Deserialize, Serialize};

use crate::error::ObjectStoreError;
use crate::tags::TagSet;

#[derive(Serialize)]
#[serde(rename = "Tagging")]
struct Tagging<'a> {
  #[serde(rename = "TagSet")]
  tag_set: TagList<'a>,
}

#[derive(Serialize)]
struct TagList<'a> {
  #[serde(rename = "Tag")]
  tags: Vec<TagEntry<'a>>,
}

#[derive(Serialize)]
struct TagEntry<'a> {
  #[serde(rename = "Key")]
  key: &'a str,
  #[serde(rename = "Value")]
  value: &'a str,
}

#[derive(Deserialize)]
struct ErrorResponse {
  #[serde(rename = "Code")]
  code: String,
}

/// `PutObjectTagging` request body.
pub(crate) fn tagging(tags: &TagSet) -> Result<String, ObjectStoreError> {
  let body = Tagging {
    tag_set: TagList {
      tags: tags
        .iter()
        .map(|tag| TagEntry {
          key: &tag.key,
          value: &tag.value,
        })
        .collect(),
    },
  };
  quick_xml::se::to_string(&body).map_err(|e| ObjectStoreError::InvalidTagSet {
    reason: format!("cannot encode tag set: {}", e),
  })
}

/// The `<Code>` of an S3 error document, if the body is one.
pub(crate) fn error_code(body: &str) -> Option<String> {
  quick_xml::de::from_str::<ErrorResponse>(body)
    .ok()
    .map(|e| e.code)
}
