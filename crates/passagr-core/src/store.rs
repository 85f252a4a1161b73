//! The `PipelineStore` trait, the single storage abstraction every pipeline
//! stage talks to.
//!
//! The trait is implemented by storage backends (e.g. `passagr-store-sqlite`)
//! and by in-memory fakes in tests. The pipeline and the API depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  changelog::{ChangelogEntry, NewChangelogEntry},
  entity::{EntityStatus, EntityType, EntityWrite, PublishedEntity},
  policy::FreshnessPolicy,
  review::{EditorialReview, NewReview, Resolution, ReviewStatus},
  source::{NewSource, SourceDocument},
};

// ─── Error classification ────────────────────────────────────────────────────

/// The failure classes the pipeline reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// The addressed row does not exist.
  NotFound,
  /// An optimistic-concurrency precondition failed; retrying from a fresh
  /// read may succeed.
  Conflict,
  /// A review was already resolved.
  AlreadyResolved,
  /// The write contradicts the stored row in a way no retry can fix, such as
  /// changing an entity's type.
  Invalid,
  /// Anything else: I/O, corruption, decoding.
  Other,
}

/// Implemented by backend error types so callers can branch on the failure
/// class without knowing the backend.
pub trait ClassifyError {
  fn kind(&self) -> StoreErrorKind;
}

impl ClassifyError for std::convert::Infallible {
  fn kind(&self) -> StoreErrorKind { match *self {} }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a passagr storage backend.
///
/// Changelog entries are append-only and reviews are never deleted. Entity
/// writes go through [`PipelineStore::upsert_entity`], which enforces
/// per-entity optimistic concurrency.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait PipelineStore: Send + Sync {
  type Error: std::error::Error + ClassifyError + Send + Sync + 'static;

  // ── Sources ───────────────────────────────────────────────────────────

  /// Register a fetched document, or refresh the one with the same URL.
  fn upsert_source(
    &self,
    input: NewSource,
  ) -> impl Future<Output = Result<SourceDocument, Self::Error>> + Send + '_;

  /// Retrieve a source by UUID. Returns `None` if not found.
  fn get_source(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SourceDocument>, Self::Error>> + Send + '_;

  /// Sources ordered by `last_checked_at`, never-checked first.
  fn sources_due_for_check(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<SourceDocument>, Self::Error>> + Send + '_;

  /// Record a link-check result.
  fn record_source_check(
    &self,
    id: Uuid,
    reliability_score: u8,
    checked_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Retrieve an entity by UUID. Returns `None` if not found.
  fn get_entity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<PublishedEntity>, Self::Error>> + Send + '_;

  /// List entities, optionally filtered by type and status.
  fn list_entities(
    &self,
    entity_type: Option<EntityType>,
    status: Option<EntityStatus>,
  ) -> impl Future<Output = Result<Vec<PublishedEntity>, Self::Error>> + Send + '_;

  /// Insert or update an entity, conditioned on its current version.
  ///
  /// - `expected_version == None`: the row must not exist yet (insert).
  /// - `expected_version == Some(v)`: the row must exist at version `v`.
  ///
  /// A violated precondition yields an error of kind
  /// [`StoreErrorKind::Conflict`]. An update never changes the entity type;
  /// one that tries fails with [`StoreErrorKind::Invalid`]. On success the
  /// stored version is one greater than before (1 for inserts).
  fn upsert_entity(
    &self,
    write: EntityWrite,
    expected_version: Option<i64>,
  ) -> impl Future<Output = Result<PublishedEntity, Self::Error>> + Send + '_;

  // ── Changelog (append-only) ────────────────────────────────────────────

  fn append_changelog(
    &self,
    entry: NewChangelogEntry,
  ) -> impl Future<Output = Result<ChangelogEntry, Self::Error>> + Send + '_;

  /// All entries for an entity, oldest first.
  fn changelog_for(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChangelogEntry>, Self::Error>> + Send + '_;

  // ── Editorial reviews ─────────────────────────────────────────────────

  /// Persist a new `pending` review.
  fn insert_review(
    &self,
    input: NewReview,
  ) -> impl Future<Output = Result<EditorialReview, Self::Error>> + Send + '_;

  fn get_review(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<EditorialReview>, Self::Error>> + Send + '_;

  /// List reviews, oldest first, optionally filtered by status.
  fn list_reviews(
    &self,
    status: Option<ReviewStatus>,
  ) -> impl Future<Output = Result<Vec<EditorialReview>, Self::Error>> + Send + '_;

  /// Resolve a pending review. Fails with [`StoreErrorKind::NotFound`] or
  /// [`StoreErrorKind::AlreadyResolved`]; a review is resolved at most once.
  fn resolve_review(
    &self,
    id: Uuid,
    resolution: Resolution,
  ) -> impl Future<Output = Result<EditorialReview, Self::Error>> + Send + '_;

  // ── Freshness policies ────────────────────────────────────────────────

  fn list_freshness_policies(
    &self,
  ) -> impl Future<Output = Result<Vec<FreshnessPolicy>, Self::Error>> + Send + '_;

  /// Insert or replace the policy for `policy.key`.
  fn put_freshness_policy(
    &self,
    policy: FreshnessPolicy,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
