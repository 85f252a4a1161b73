//! In-memory fakes for the pipeline's unit tests.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU32, Ordering},
  },
};

use chrono::{DateTime, Utc};
use passagr_core::{
  changelog::{ChangelogEntry, NewChangelogEntry},
  entity::{EntityStatus, EntityType, EntityWrite, PublishedEntity},
  policy::FreshnessPolicy,
  review::{EditorialReview, NewReview, Resolution, ReviewStatus},
  source::{DEFAULT_RELIABILITY, NewSource, SourceDocument},
  store::{ClassifyError, PipelineStore, StoreErrorKind},
};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ExtractionModel, ExtractionRequest, ModelError};

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("memory store: {message}")]
pub struct MemoryError {
  kind:    StoreErrorKind,
  message: String,
}

impl MemoryError {
  fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into() }
  }
}

impl ClassifyError for MemoryError {
  fn kind(&self) -> StoreErrorKind { self.kind }
}

#[derive(Default)]
struct Tables {
  sources:   Vec<SourceDocument>,
  entities:  HashMap<Uuid, PublishedEntity>,
  changelog: Vec<ChangelogEntry>,
  reviews:   Vec<EditorialReview>,
  policies:  Vec<FreshnessPolicy>,
}

/// A `PipelineStore` over plain vectors, with switches to inject failures.
#[derive(Default)]
pub struct MemoryStore {
  tables:                Mutex<Tables>,
  pub fail_lookups:      AtomicBool,
  pub fail_review_insert: AtomicBool,
  /// Number of upcoming `append_changelog` calls that fail.
  pub changelog_failures: AtomicU32,
}

impl MemoryStore {
  fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
    self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Insert or overwrite an entity directly, bypassing version checks.
  pub fn put_entity(&self, entity: PublishedEntity) {
    self.tables().entities.insert(entity.entity_id, entity);
  }

  pub fn entity_count(&self) -> usize { self.tables().entities.len() }

  pub fn changelog_len(&self) -> usize { self.tables().changelog.len() }

  pub fn review_count(&self) -> usize { self.tables().reviews.len() }
}

impl PipelineStore for MemoryStore {
  type Error = MemoryError;

  async fn upsert_source(&self, input: NewSource) -> Result<SourceDocument, MemoryError> {
    let mut t = self.tables();
    let now = Utc::now();
    if let Some(existing) = t.sources.iter_mut().find(|s| s.url == input.url) {
      existing.title = input.title;
      existing.publisher = input.publisher;
      existing.content_type = input.content_type;
      existing.excerpt = input.excerpt;
      existing.fetched_at = now;
      return Ok(existing.clone());
    }
    let source = SourceDocument {
      source_id: Uuid::new_v4(),
      url: input.url,
      title: input.title,
      publisher: input.publisher,
      content_type: input.content_type,
      excerpt: input.excerpt,
      fetched_at: now,
      last_checked_at: None,
      reliability_score: DEFAULT_RELIABILITY,
    };
    t.sources.push(source.clone());
    Ok(source)
  }

  async fn get_source(&self, id: Uuid) -> Result<Option<SourceDocument>, MemoryError> {
    Ok(self.tables().sources.iter().find(|s| s.source_id == id).cloned())
  }

  async fn sources_due_for_check(
    &self,
    limit: usize,
  ) -> Result<Vec<SourceDocument>, MemoryError> {
    let mut sources = self.tables().sources.clone();
    sources.sort_by_key(|s| (s.last_checked_at.is_some(), s.last_checked_at));
    sources.truncate(limit);
    Ok(sources)
  }

  async fn record_source_check(
    &self,
    id: Uuid,
    reliability_score: u8,
    checked_at: DateTime<Utc>,
  ) -> Result<(), MemoryError> {
    let mut t = self.tables();
    let source = t
      .sources
      .iter_mut()
      .find(|s| s.source_id == id)
      .ok_or_else(|| MemoryError::new(StoreErrorKind::NotFound, "source"))?;
    source.reliability_score = reliability_score;
    source.last_checked_at = Some(checked_at);
    Ok(())
  }

  async fn get_entity(&self, id: Uuid) -> Result<Option<PublishedEntity>, MemoryError> {
    if self.fail_lookups.load(Ordering::SeqCst) {
      return Err(MemoryError::new(StoreErrorKind::Other, "lookup unavailable"));
    }
    Ok(self.tables().entities.get(&id).cloned())
  }

  async fn list_entities(
    &self,
    entity_type: Option<EntityType>,
    status: Option<EntityStatus>,
  ) -> Result<Vec<PublishedEntity>, MemoryError> {
    let mut entities: Vec<_> = self
      .tables()
      .entities
      .values()
      .filter(|e| entity_type.is_none_or(|t| e.entity_type == t))
      .filter(|e| status.is_none_or(|s| e.status == s))
      .cloned()
      .collect();
    entities.sort_by_key(|e| e.created_at);
    Ok(entities)
  }

  async fn upsert_entity(
    &self,
    write: EntityWrite,
    expected_version: Option<i64>,
  ) -> Result<PublishedEntity, MemoryError> {
    let mut t = self.tables();
    let current = t.entities.get(&write.entity_id).cloned();
    if current.as_ref().map(|e| e.version) != expected_version {
      return Err(MemoryError::new(StoreErrorKind::Conflict, "version mismatch"));
    }
    if current.as_ref().is_some_and(|e| e.entity_type != write.entity_type) {
      return Err(MemoryError::new(StoreErrorKind::Invalid, "entity type change"));
    }
    let now = Utc::now();
    let entity = PublishedEntity {
      entity_id:        write.entity_id,
      entity_type:      write.entity_type,
      fields:           write.fields,
      status:           write.status,
      version:          current.as_ref().map_or(1, |e| e.version + 1),
      last_verified_at: write.last_verified_at,
      created_at:       current.as_ref().map_or(now, |e| e.created_at),
      updated_at:       now,
    };
    t.entities.insert(entity.entity_id, entity.clone());
    Ok(entity)
  }

  async fn append_changelog(
    &self,
    entry: NewChangelogEntry,
  ) -> Result<ChangelogEntry, MemoryError> {
    let remaining = self.changelog_failures.load(Ordering::SeqCst);
    if remaining > 0 {
      self.changelog_failures.store(remaining - 1, Ordering::SeqCst);
      return Err(MemoryError::new(StoreErrorKind::Other, "changelog unavailable"));
    }
    let stored = ChangelogEntry {
      changelog_id: Uuid::new_v4(),
      entity_type:  entry.entity_type,
      entity_id:    entry.entity_id,
      change_type:  entry.change_type,
      diff_summary: entry.diff_summary,
      diff_fields:  entry.diff_fields,
      snapshot:     entry.snapshot,
      created_by:   entry.created_by,
      source_ids:   entry.source_ids,
      created_at:   Utc::now(),
    };
    self.tables().changelog.push(stored.clone());
    Ok(stored)
  }

  async fn changelog_for(&self, entity_id: Uuid) -> Result<Vec<ChangelogEntry>, MemoryError> {
    Ok(
      self
        .tables()
        .changelog
        .iter()
        .filter(|e| e.entity_id == entity_id)
        .cloned()
        .collect(),
    )
  }

  async fn insert_review(&self, input: NewReview) -> Result<EditorialReview, MemoryError> {
    if self.fail_review_insert.load(Ordering::SeqCst) {
      return Err(MemoryError::new(StoreErrorKind::Other, "review insert failed"));
    }
    let review = EditorialReview {
      review_id:     Uuid::new_v4(),
      entity_type:   input.entity_type,
      entity_id:     input.entity_id,
      status:        ReviewStatus::Pending,
      reason:        input.reason,
      notes:         input.notes,
      proposed_data: input.proposed_data,
      diff:          input.diff,
      created_at:    Utc::now(),
      reviewer_uid:  None,
      resolved_at:   None,
    };
    self.tables().reviews.push(review.clone());
    Ok(review)
  }

  async fn get_review(&self, id: Uuid) -> Result<Option<EditorialReview>, MemoryError> {
    Ok(self.tables().reviews.iter().find(|r| r.review_id == id).cloned())
  }

  async fn list_reviews(
    &self,
    status: Option<ReviewStatus>,
  ) -> Result<Vec<EditorialReview>, MemoryError> {
    Ok(
      self
        .tables()
        .reviews
        .iter()
        .filter(|r| status.is_none_or(|s| r.status == s))
        .cloned()
        .collect(),
    )
  }

  async fn resolve_review(
    &self,
    id: Uuid,
    resolution: Resolution,
  ) -> Result<EditorialReview, MemoryError> {
    let mut t = self.tables();
    let review = t
      .reviews
      .iter_mut()
      .find(|r| r.review_id == id)
      .ok_or_else(|| MemoryError::new(StoreErrorKind::NotFound, "review"))?;
    if review.status.is_terminal() {
      return Err(MemoryError::new(StoreErrorKind::AlreadyResolved, "review"));
    }
    review.status = resolution.status();
    review.reviewer_uid = Some(resolution.reviewer_uid);
    if let Some(notes) = resolution.notes {
      review.notes = Some(notes);
    }
    review.resolved_at = Some(Utc::now());
    Ok(review.clone())
  }

  async fn list_freshness_policies(&self) -> Result<Vec<FreshnessPolicy>, MemoryError> {
    Ok(self.tables().policies.clone())
  }

  async fn put_freshness_policy(&self, policy: FreshnessPolicy) -> Result<(), MemoryError> {
    let mut t = self.tables();
    t.policies.retain(|p| p.key != policy.key);
    t.policies.push(policy);
    Ok(())
  }
}

// ─── Model ───────────────────────────────────────────────────────────────────

/// An `ExtractionModel` with a canned answer that records its prompts.
#[derive(Clone)]
pub struct StubModel {
  answer:  Option<String>,
  prompts: Arc<Mutex<Vec<String>>>,
}

impl StubModel {
  pub fn answering(answer: impl Into<String>) -> Self {
    Self { answer: Some(answer.into()), prompts: Arc::default() }
  }

  pub fn failing() -> Self { Self { answer: None, prompts: Arc::default() } }

  pub fn last_prompt(&self) -> Option<String> {
    self.prompts.lock().ok().and_then(|p| p.last().cloned())
  }
}

impl ExtractionModel for StubModel {
  async fn complete(&self, request: ExtractionRequest) -> Result<String, ModelError> {
    if let Ok(mut prompts) = self.prompts.lock() {
      prompts.push(request.prompt);
    }
    self.answer.clone().ok_or(ModelError::Status {
      status: 503,
      body:   "unavailable".to_owned(),
    })
  }
}
