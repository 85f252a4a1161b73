//! Error type for `passagr-store-sqlite`.

use passagr_core::store::{ClassifyError, StoreErrorKind};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] passagr_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A column held a value no domain type decodes from.
  #[error("decode error: {0}")]
  Decode(String),

  #[error(
    "version conflict on entity {entity_id}: expected {expected:?}, found {found:?}"
  )]
  VersionConflict {
    entity_id: Uuid,
    expected:  Option<i64>,
    found:     Option<i64>,
  },

  #[error("entity {entity_id} is a {stored}; refusing to rewrite it as a {proposed}")]
  EntityTypeChanged {
    entity_id: Uuid,
    stored:    String,
    proposed:  String,
  },

  #[error("source not found: {0}")]
  SourceNotFound(Uuid),

  #[error("review not found: {0}")]
  ReviewNotFound(Uuid),

  #[error("review {0} is already resolved")]
  ReviewAlreadyResolved(Uuid),
}

impl ClassifyError for Error {
  fn kind(&self) -> StoreErrorKind {
    match self {
      Self::VersionConflict { .. } => StoreErrorKind::Conflict,
      Self::SourceNotFound(_) | Self::ReviewNotFound(_) => StoreErrorKind::NotFound,
      Self::ReviewAlreadyResolved(_) => StoreErrorKind::AlreadyResolved,
      Self::EntityTypeChanged { .. } => StoreErrorKind::Invalid,
      _ => StoreErrorKind::Other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
