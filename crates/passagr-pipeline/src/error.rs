//! Error type for `passagr-pipeline`.

use passagr_core::{
  changelog::NewChangelogEntry,
  entity::EntityType,
  store::{ClassifyError, StoreErrorKind},
};
use thiserror::Error;
use uuid::Uuid;

use crate::model::ModelError;

/// A boxed backend error; the pipeline is generic over its store.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  // ── Extraction failures: nothing was written ─────────────────────────────
  #[error("source not found: {0}")]
  SourceNotFound(Uuid),

  #[error("source {0} has no extracted text")]
  EmptySource(Uuid),

  #[error("extraction model failed: {0}")]
  Model(#[from] ModelError),

  #[error("model output is not valid JSON: {0}")]
  ExtractionParse(#[from] serde_json::Error),

  #[error("model output is not a JSON object")]
  MalformedExtraction,

  // ── Storage ──────────────────────────────────────────────────────────────
  /// The current entity could not be read and the differ is configured to
  /// abort rather than assume an addition.
  #[error("lookup of entity {entity_id} failed: {source}")]
  Lookup { entity_id: Uuid, source: BoxError },

  /// The entity moved on since the diff was computed. Retrying from a fresh
  /// extraction may succeed.
  #[error("version conflict publishing entity {entity_id}: {source}")]
  Conflict { entity_id: Uuid, source: BoxError },

  #[error("entity not found: {0}")]
  EntityNotFound(Uuid),

  /// The candidate names an existing entity of another type.
  #[error("entity {entity_id} is a {stored}, not a {proposed}")]
  EntityTypeMismatch {
    entity_id: Uuid,
    stored:    EntityType,
    proposed:  EntityType,
  },

  #[error("entity {0} is already unpublished")]
  AlreadyUnpublished(Uuid),

  #[error("review not found: {0}")]
  ReviewNotFound(Uuid),

  #[error("review {0} is already resolved")]
  ReviewAlreadyResolved(Uuid),

  /// The entity row was written but its changelog entry was not. The entry is
  /// carried so it can be appended later via
  /// [`Publisher::append_changelog`](crate::publisher::Publisher::append_changelog).
  #[error("entity {entity_id} published without a changelog entry: {source}")]
  Unaudited {
    entity_id: Uuid,
    entry:     Box<NewChangelogEntry>,
    source:    BoxError,
  },

  #[error("storage error: {0}")]
  Store(#[source] BoxError),
}

impl Error {
  /// Wrap an unclassified store failure.
  pub(crate) fn store<E>(err: E) -> Self
  where
    E: std::error::Error + ClassifyError + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  /// Wrap a store failure from a review operation, keeping the review-specific
  /// classes distinct.
  pub(crate) fn review_store<E>(review_id: Uuid, err: E) -> Self
  where
    E: std::error::Error + ClassifyError + Send + Sync + 'static,
  {
    match err.kind() {
      StoreErrorKind::NotFound => Self::ReviewNotFound(review_id),
      StoreErrorKind::AlreadyResolved => Self::ReviewAlreadyResolved(review_id),
      _ => Self::store(err),
    }
  }

  /// Whether re-running the candidate from a fresh read may succeed.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::Conflict { .. }) }

  /// Whether the failure happened before any state was written.
  pub fn is_extraction_failure(&self) -> bool {
    matches!(
      self,
      Self::SourceNotFound(_)
        | Self::EmptySource(_)
        | Self::Model(_)
        | Self::ExtractionParse(_)
        | Self::MalformedExtraction
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
