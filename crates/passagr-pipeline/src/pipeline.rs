//! [`Pipeline`]: the stages wired over one store, plus review resolution.

use std::{sync::Arc, time::Duration};

use passagr_core::{
  changelog::Attribution,
  diff::ChangeType,
  entity::CandidateEntity,
  policy::CriticalFields,
  review::{EditorialReview, Resolution, ReviewReason, ReviewStatus},
  store::PipelineStore,
};
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  alert::Alert,
  differ::{DiffOutcome, Differ, LookupFailurePolicy},
  extractor::{ExtractionTask, Extractor},
  model::ExtractionModel,
  publisher::{Publication, Publisher},
  router::{EditorialRouter, RouteAction},
  signals::Signals,
  validator::Validator,
};

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Retries of a failed changelog append before a publish is unaudited.
  pub changelog_retries: u32,
  /// Delay before the first retry; doubled after each failure.
  pub retry_backoff_ms:  u64,
  pub lookup_failure:    LookupFailurePolicy,
  /// Upper bound on candidates processed at once by [`Pipeline::run_batch`].
  pub batch_concurrency: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      changelog_retries: 3,
      retry_backoff_ms:  100,
      lookup_failure:    LookupFailurePolicy::TreatAsAdd,
      batch_concurrency: 4,
    }
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// How far a candidate got.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  /// Nothing differs from the published entity.
  Unchanged,
  PendingReview { review_id: Uuid, reason: ReviewReason },
  Published {
    entity_id:    Uuid,
    changelog_id: Uuid,
    change_type:  ChangeType,
    alert:        Option<Alert>,
  },
}

impl Outcome {
  fn published(publication: &Publication, alert: Option<Alert>) -> Self {
    Self::Published {
      entity_id: publication.entity.entity_id,
      changelog_id: publication.changelog.changelog_id,
      change_type: publication.changelog.change_type,
      alert,
    }
  }
}

/// Per-item result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
  pub task:    ExtractionTask,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub outcome: Option<Outcome>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:   Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
  pub published:      usize,
  pub pending_review: usize,
  pub unchanged:      usize,
  pub failed:         usize,
  pub items:          Vec<BatchItem>,
}

impl BatchReport {
  fn record(&mut self, task: ExtractionTask, result: Result<Outcome>) {
    let item = match result {
      Ok(outcome) => {
        match outcome {
          Outcome::Unchanged => self.unchanged += 1,
          Outcome::PendingReview { .. } => self.pending_review += 1,
          Outcome::Published { .. } => self.published += 1,
        }
        BatchItem { task, outcome: Some(outcome), error: None }
      }
      Err(e) => {
        self.failed += 1;
        BatchItem { task, outcome: None, error: Some(e.to_string()) }
      }
    };
    self.items.push(item);
  }
}

/// The result of approving a review.
#[derive(Debug, Clone, Serialize)]
pub struct Approval {
  pub review:      EditorialReview,
  pub publication: Publication,
  pub alert:       Option<Alert>,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<S, M> {
  store:     Arc<S>,
  extractor: Extractor<S, M>,
  validator: Validator,
  differ:    Differ<S>,
  router:    EditorialRouter<S>,
  publisher: Publisher<S>,
  config:    PipelineConfig,
}

impl<S: PipelineStore, M: ExtractionModel> Pipeline<S, M> {
  pub fn new(
    store: Arc<S>,
    model: M,
    critical: CriticalFields,
    signals: Signals,
    config: PipelineConfig,
  ) -> Self {
    Self {
      extractor: Extractor::new(store.clone(), model),
      validator: Validator,
      differ: Differ::new(store.clone(), config.lookup_failure),
      router: EditorialRouter::new(store.clone(), critical),
      publisher: Publisher::new(store.clone(), signals).with_retries(
        config.changelog_retries,
        Duration::from_millis(config.retry_backoff_ms),
      ),
      store,
      config,
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn publisher(&self) -> &Publisher<S> { &self.publisher }

  pub fn critical_fields(&self) -> &CriticalFields { self.router.critical_fields() }

  /// Extract a candidate from a source and take it through every stage.
  pub async fn run(&self, task: &ExtractionTask) -> Result<Outcome> {
    let candidate = self.extractor.extract(task).await.inspect_err(|e| {
      warn!(source_id = %task.source_id, error = %e, "extraction failed; halting");
    })?;
    self.process(candidate).await
  }

  /// Validate, diff, route and, when allowed, publish a candidate.
  pub async fn process(&self, candidate: CandidateEntity) -> Result<Outcome> {
    let validation = self.validator.validate(&candidate);
    info!(
      entity_type = %candidate.entity_type,
      entity_id = ?candidate.entity_id,
      valid = validation.valid,
      impact = %validation.impact,
      errors = validation.errors.len(),
      warnings = validation.warnings.len(),
      "validated candidate"
    );

    let diff = match self.differ.diff(&candidate).await? {
      DiffOutcome::Changed(diff) => diff,
      DiffOutcome::Unchanged => {
        info!(entity_id = ?candidate.entity_id, "no changes; stopping");
        return Ok(Outcome::Unchanged);
      }
    };

    let decision = self.router.route(&candidate, &validation, &diff).await?;
    if let (RouteAction::PendingReview, Some(review_id), Some(reason)) =
      (decision.action, decision.review_id, decision.reason)
    {
      return Ok(Outcome::PendingReview { review_id, reason });
    }

    let attribution = Attribution::Automated;
    let publication = self.publisher.publish(&candidate, &diff, &attribution).await?;
    let alert = Alert::compose(&candidate, &diff, validation.impact, &attribution);
    if let Some(alert) = &alert {
      info!(notification = %alert.notification, "alert");
    }
    Ok(Outcome::published(&publication, alert))
  }

  /// Run independent tasks concurrently.
  ///
  /// One failing task never fails the batch; failures are counted and
  /// reported per item.
  pub async fn run_batch(self: &Arc<Self>, tasks: Vec<ExtractionTask>) -> BatchReport
  where
    S: 'static,
    M: 'static,
  {
    let permits = Arc::new(Semaphore::new(self.config.batch_concurrency.max(1)));
    let mut set = JoinSet::new();
    for task in tasks {
      let pipeline = Arc::clone(self);
      let permits = Arc::clone(&permits);
      set.spawn(async move {
        let _permit = permits.acquire_owned().await;
        let result = pipeline.run(&task).await;
        (task, result)
      });
    }

    let mut report = BatchReport::default();
    while let Some(joined) = set.join_next().await {
      match joined {
        Ok((task, result)) => report.record(task, result),
        Err(e) => {
          warn!(error = %e, "batch task panicked");
          report.failed += 1;
        }
      }
    }
    info!(
      published = report.published,
      pending_review = report.pending_review,
      unchanged = report.unchanged,
      failed = report.failed,
      "batch complete"
    );
    report
  }

  // ── Review resolution ─────────────────────────────────────────────────────

  /// Publish a pending review's proposal, then mark it approved.
  ///
  /// If the publish fails (typically a version conflict because the entity
  /// changed after the review was opened) the review stays pending.
  pub async fn approve(
    &self,
    review_id: Uuid,
    reviewer_uid: &str,
    notes: Option<String>,
  ) -> Result<Approval> {
    let review = self.pending_review(review_id).await?;
    let related = self.related_additions(&review).await?;
    if !related.is_empty() {
      warn!(%review_id, ?related, "other pending reviews propose the same new entity");
    }

    // A proposed addition is published under the review's id, so a retried
    // approval conflicts instead of inserting a second entity.
    let mut candidate = review.proposed_data.clone();
    candidate.entity_id.get_or_insert(review.review_id);

    let attribution = Attribution::Reviewer(reviewer_uid.to_owned());
    let publication = match self.publisher.publish(&candidate, &review.diff, &attribution).await {
      Ok(publication) => publication,
      Err(err @ Error::Unaudited { .. }) => {
        self.resolve(review_id, Resolution::approve(reviewer_uid, notes)).await?;
        return Err(err);
      }
      Err(err) => {
        warn!(%review_id, error = %err, "approval could not be published; review stays pending");
        return Err(err);
      }
    };

    let review = self.resolve(review_id, Resolution::approve(reviewer_uid, notes)).await?;
    let impact = self.validator.validate(&candidate).impact;
    let alert = Alert::compose(&candidate, &review.diff, impact, &attribution);

    info!(%review_id, reviewer_uid, entity_id = %publication.entity.entity_id, "review approved");
    Ok(Approval { review, publication, alert })
  }

  /// Other pending reviews proposing a new entity of the same type from the
  /// same source. Approving more than one of them creates duplicates.
  pub async fn related_additions(&self, review: &EditorialReview) -> Result<Vec<Uuid>> {
    if review.diff.change_type != ChangeType::Add || review.entity_id.is_some() {
      return Ok(vec![]);
    }
    let pending = self
      .store
      .list_reviews(Some(ReviewStatus::Pending))
      .await
      .map_err(Error::store)?;
    Ok(
      pending
        .into_iter()
        .filter(|other| {
          other.review_id != review.review_id
            && other.entity_id.is_none()
            && other.diff.change_type == ChangeType::Add
            && other.entity_type == review.entity_type
            && other.proposed_data.source_id == review.proposed_data.source_id
        })
        .map(|other| other.review_id)
        .collect(),
    )
  }

  /// Mark a pending review rejected. Nothing is published.
  pub async fn reject(
    &self,
    review_id: Uuid,
    reviewer_uid: &str,
    notes: Option<String>,
  ) -> Result<EditorialReview> {
    self.pending_review(review_id).await?;
    let review = self.resolve(review_id, Resolution::reject(reviewer_uid, notes)).await?;
    info!(%review_id, reviewer_uid, "review rejected");
    Ok(review)
  }

  async fn pending_review(&self, review_id: Uuid) -> Result<EditorialReview> {
    let review = self
      .store
      .get_review(review_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ReviewNotFound(review_id))?;
    if review.status.is_terminal() {
      return Err(Error::ReviewAlreadyResolved(review_id));
    }
    Ok(review)
  }

  async fn resolve(&self, review_id: Uuid, resolution: Resolution) -> Result<EditorialReview> {
    self
      .store
      .resolve_review(review_id, resolution)
      .await
      .map_err(|e| Error::review_store(review_id, e))
  }
}
