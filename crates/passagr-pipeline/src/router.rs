//! Stage 4: decide between human review and automatic publication.

use std::sync::Arc;

use passagr_core::{
  diff::{ChangeType, DiffOutput},
  entity::CandidateEntity,
  policy::CriticalFields,
  review::{NewReview, ReviewReason},
  store::PipelineStore,
  validation::{Impact, ValidationResult},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
  PendingReview,
  AutoPublish,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
  pub requires_review: bool,
  pub action:          RouteAction,
  pub impact:          Impact,
  /// The highest-priority reason that applied, when review is required.
  pub reason:          Option<ReviewReason>,
  /// Diff paths that matched the critical-field set.
  pub critical_fields: Vec<String>,
  /// Set once the pending review has been persisted.
  pub review_id:       Option<Uuid>,
}

pub struct EditorialRouter<S> {
  store:    Arc<S>,
  critical: CriticalFields,
}

impl<S: PipelineStore> EditorialRouter<S> {
  pub fn new(store: Arc<S>, critical: CriticalFields) -> Self { Self { store, critical } }

  pub fn critical_fields(&self) -> &CriticalFields { &self.critical }

  /// The routing rule, without side effects.
  ///
  /// Review is required when the change adds or republishes an entity, when
  /// validation reported high impact, or when any changed path falls under a
  /// critical field for the entity type.
  pub fn decide(
    &self,
    candidate: &CandidateEntity,
    validation: &ValidationResult,
    diff: &DiffOutput,
  ) -> RoutingDecision {
    let critical_fields: Vec<String> = diff
      .field_names()
      .filter(|path| self.critical.matching(candidate.entity_type, path).is_some())
      .map(str::to_owned)
      .collect();

    let reason = if diff.is_republish() {
      Some(ReviewReason::Republish)
    } else if diff.change_type == ChangeType::Add {
      Some(ReviewReason::NewEntity)
    } else if validation.impact == Impact::High {
      Some(ReviewReason::HighImpact)
    } else if !critical_fields.is_empty() {
      Some(ReviewReason::CriticalField)
    } else {
      None
    };

    let requires_review = reason.is_some();
    RoutingDecision {
      requires_review,
      action: if requires_review { RouteAction::PendingReview } else { RouteAction::AutoPublish },
      impact: validation.impact,
      reason,
      critical_fields,
      review_id: None,
    }
  }

  /// Decide, and persist a pending review when one is required.
  ///
  /// A failed review insert is an error; the candidate is never reported as
  /// routed without its review on record.
  pub async fn route(
    &self,
    candidate: &CandidateEntity,
    validation: &ValidationResult,
    diff: &DiffOutput,
  ) -> Result<RoutingDecision> {
    let mut decision = self.decide(candidate, validation, diff);
    let Some(reason) = decision.reason else {
      info!(
        entity_type = %candidate.entity_type,
        impact = %decision.impact,
        "routing to auto-publish"
      );
      return Ok(decision);
    };

    let review = self
      .store
      .insert_review(NewReview {
        entity_type:   candidate.entity_type,
        entity_id:     candidate.entity_id,
        reason,
        notes:         Some(reason.note()),
        proposed_data: candidate.clone(),
        diff:          diff.clone(),
      })
      .await
      .map_err(|e| {
        warn!(entity_type = %candidate.entity_type, error = %e, "could not record review");
        Error::store(e)
      })?;

    info!(
      review_id = %review.review_id,
      entity_type = %candidate.entity_type,
      %reason,
      "change held for editorial review"
    );
    decision.review_id = Some(review.review_id);
    Ok(decision)
  }
}
