/// Error type for metadata store reads.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The metadata store could not serve the request.
  #[error("metadata store unavailable: {message}")]
  Unavailable { message: String },

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A stored metadata document could not be decoded.
  #[error("invalid metadata document: {0}")]
  Json(#[from] serde_json::Error),
}
