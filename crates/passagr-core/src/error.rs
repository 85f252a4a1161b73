//! Error types for `passagr-core`.

use thiserror::Error;

use crate::review::ReviewStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown entity type: {0:?}")]
  UnknownEntityType(String),

  #[error("a review cannot be resolved to {0}")]
  NonTerminalResolution(ReviewStatus),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
