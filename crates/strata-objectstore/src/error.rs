/// Error type for object store operations.
///
/// Messages name the operation, bucket and key involved. Credentials never
/// appear in them.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
  /// The backend client was never initialized.
  #[error("{backend} client is not initialized")]
  NotConfigured { backend: &'static str },

  /// The backend configuration is unusable.
  #[error("invalid {backend} configuration: {message}")]
  InvalidConfig {
    backend: &'static str,
    message: String,
  },

  /// The bucket or key is missing or malformed.
  #[error("invalid object locator: {reason}")]
  InvalidLocator { reason: String },

  /// The tag set violates the backend's limits.
  #[error("invalid tag set: {reason}")]
  InvalidTagSet { reason: String },

  /// The object does not exist.
  #[error("object not found: {bucket}/{key}")]
  NotFound { bucket: String, key: String },

  /// The object is larger than the backend accepts in one write.
  #[error("object {bucket}/{key} exceeds the {limit} byte write limit")]
  ObjectTooLarge {
    bucket: String,
    key: String,
    limit: usize,
  },

  /// The remote tagging call failed.
  #[error("failed to add tags to {bucket}/{key}: {operation}: {message}")]
  RemoteTagFailure {
    operation: &'static str,
    bucket: String,
    key: String,
    message: String,
  },

  /// The remote write call failed.
  #[error("failed to write {bucket}/{key}: {operation}: {message}")]
  RemoteWriteFailure {
    operation: &'static str,
    bucket: String,
    key: String,
    message: String,
  },

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The operation was cancelled by the caller.
  #[error("object store operation cancelled")]
  Cancelled,
}

impl ObjectStoreError {
  /// Whether the caller may retry the operation with backoff.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      ObjectStoreError::RemoteTagFailure { .. } | ObjectStoreError::RemoteWriteFailure { .. }
    )
  }
}
