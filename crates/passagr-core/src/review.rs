//! Editorial reviews: the durable record of a change waiting for a human.
//!
//! A review is created `pending` by the editorial router and resolved exactly
//! once, to `approved` or `rejected`. Reviews are never deleted; together they
//! form the audit trail of editorial decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  diff::DiffOutput,
  entity::{CandidateEntity, EntityType},
};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewStatus {
  Pending,
  Approved,
  Rejected,
}

impl ReviewStatus {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }
}

// ─── Reason ──────────────────────────────────────────────────────────────────

/// Why a change was held for review. Variants are listed in priority order:
/// when several apply, the first one is recorded.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
  #[strum(serialize = "New entity")]
  NewEntity,
  #[strum(serialize = "Republishes an unpublished entity")]
  Republish,
  #[strum(serialize = "High impact validation error")]
  HighImpact,
  #[strum(serialize = "Critical safety field change")]
  CriticalField,
}

impl ReviewReason {
  /// The note stored on a freshly created review.
  pub fn note(self) -> String { format!("Requires review. Reason: {self}.") }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorialReview {
  pub review_id:     Uuid,
  pub entity_type:   EntityType,
  pub entity_id:     Option<Uuid>,
  pub status:        ReviewStatus,
  pub reason:        ReviewReason,
  pub notes:         Option<String>,
  /// Full snapshot of the proposal, replayed into the publisher on approval.
  pub proposed_data: CandidateEntity,
  #[serde(flatten)]
  pub diff:          DiffOutput,
  pub created_at:    DateTime<Utc>,
  pub reviewer_uid:  Option<String>,
  pub resolved_at:   Option<DateTime<Utc>>,
}

/// Input to [`crate::store::PipelineStore::insert_review`]. The store assigns
/// the id, `created_at`, and the `pending` status.
#[derive(Debug, Clone)]
pub struct NewReview {
  pub entity_type:   EntityType,
  pub entity_id:     Option<Uuid>,
  pub reason:        ReviewReason,
  pub notes:         Option<String>,
  pub proposed_data: CandidateEntity,
  pub diff:          DiffOutput,
}

/// A human decision on a pending review.
#[derive(Debug, Clone)]
pub struct Resolution {
  status:           ReviewStatus,
  pub reviewer_uid: String,
  /// Replaces the review's notes when present.
  pub notes:        Option<String>,
}

impl Resolution {
  pub fn new(
    status: ReviewStatus,
    reviewer_uid: impl Into<String>,
    notes: Option<String>,
  ) -> Result<Self> {
    if !status.is_terminal() {
      return Err(Error::NonTerminalResolution(status));
    }
    Ok(Self { status, reviewer_uid: reviewer_uid.into(), notes })
  }

  pub fn approve(reviewer_uid: impl Into<String>, notes: Option<String>) -> Self {
    Self { status: ReviewStatus::Approved, reviewer_uid: reviewer_uid.into(), notes }
  }

  pub fn reject(reviewer_uid: impl Into<String>, notes: Option<String>) -> Self {
    Self { status: ReviewStatus::Rejected, reviewer_uid: reviewer_uid.into(), notes }
  }

  pub fn status(&self) -> ReviewStatus { self.status }
}
