//! Custom property values.
//!
//! Executions and artifacts carry string-keyed custom properties whose values
//! cross a serialization boundary. Nothing about their shape is assumed: every
//! read goes through one of the checked accessors below.
//!
//! The wire form is externally tagged:
//!
//! ```json
//! {
//!   "output_artifacts": { "string_value": "{\"model\": ...}" },
//!   "epochs": { "int_value": 10 },
//!   "accuracy": { "double_value": 0.93 }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// A loosely-typed custom property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
  #[serde(rename = "int_value")]
  Int(i64),
  #[serde(rename = "double_value")]
  Double(f64),
  #[serde(rename = "string_value")]
  String(String),
  #[serde(rename = "struct_value")]
  Struct(serde_json::Value),
  #[serde(rename = "bool_value")]
  Bool(bool),
}

impl PropertyValue {
  /// Name of the variant, for diagnostics.
  pub fn kind(&self) -> &'static str {
    match self {
      PropertyValue::Int(_) => "int",
      PropertyValue::Double(_) => "double",
      PropertyValue::String(_) => "string",
      PropertyValue::Struct(_) => "struct",
      PropertyValue::Bool(_) => "bool",
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      PropertyValue::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      PropertyValue::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_double(&self) -> Option<f64> {
    match self {
      PropertyValue::Double(d) => Some(*d),
      _ => None,
    }
  }

  pub fn as_struct(&self) -> Option<&serde_json::Value> {
    match self {
      PropertyValue::Struct(v) => Some(v),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      PropertyValue::Bool(b) => Some(*b),
      _ => None,
    }
  }

  /// Convert to a plain JSON value.
  ///
  /// Returns `None` for doubles that JSON cannot represent (NaN, infinities).
  pub fn to_json(&self) -> Option<serde_json::Value> {
    match self {
      PropertyValue::Int(i) => Some(serde_json::Value::from(*i)),
      PropertyValue::Double(d) => serde_json::Number::from_f64(*d).map(serde_json::Value::Number),
      PropertyValue::String(s) => Some(serde_json::Value::String(s.clone())),
      PropertyValue::Struct(v) => Some(v.clone()),
      PropertyValue::Bool(b) => Some(serde_json::Value::Bool(*b)),
    }
  }
}

impl From<&str> for PropertyValue {
  fn from(value: &str) -> Self {
    PropertyValue::String(value.to_string())
  }
}

impl From<String> for PropertyValue {
  fn from(value: String) -> Self {
    PropertyValue::String(value)
  }
}

impl From<i64> for PropertyValue {
  fn from(value: i64) -> Self {
    PropertyValue::Int(value)
  }
}

impl From<f64> for PropertyValue {
  fn from(value: f64) -> Self {
    PropertyValue::Double(value)
  }
}

impl From<bool> for PropertyValue {
  fn from(value: bool) -> Self {
    PropertyValue::Bool(value)
  }
}
