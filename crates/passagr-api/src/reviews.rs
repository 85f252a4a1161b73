//! Handlers for the editorial review surface.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reviews` | Optional `?status=pending\|approved\|rejected` |
//! | `GET`  | `/reviews/{id}` | Review with current and proposed entity, plus duplicate additions |
//! | `POST` | `/reviews/{id}/approve` | Body: `{"reviewer_uid":"…","notes":"…"}` |
//! | `POST` | `/reviews/{id}/reject` | Same body; nothing is published |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use passagr_core::{
  entity::{CandidateEntity, PublishedEntity},
  review::{EditorialReview, ReviewStatus},
  store::PipelineStore,
};
use passagr_pipeline::{links::LinkProbe, model::ExtractionModel, pipeline::Approval};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Admin, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<ReviewStatus>,
}

/// `GET /reviews[?status=<status>]`
pub async fn list<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<EditorialReview>>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let reviews = state
    .pipeline
    .store()
    .list_reviews(params.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(reviews))
}

// ─── Detail ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReviewDetail {
  pub review:   EditorialReview,
  /// The published entity as it is now, if there is one.
  pub current:  Option<PublishedEntity>,
  pub proposed: CandidateEntity,
  /// Other pending reviews that would add the same entity from the same
  /// source.
  pub related_additions: Vec<Uuid>,
}

/// `GET /reviews/{id}`
pub async fn get_one<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ReviewDetail>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let store = state.pipeline.store();
  let review = store
    .get_review(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))?;

  let current = match review.entity_id {
    Some(entity_id) => store.get_entity(entity_id).await.map_err(ApiError::store)?,
    None => None,
  };
  let proposed = review.proposed_data.clone();
  let related_additions = state.pipeline.related_additions(&review).await?;

  Ok(Json(ReviewDetail { review, current, proposed, related_additions }))
}

// ─── Resolve ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ResolveBody {
  /// Defaults to the authenticated editor.
  pub reviewer_uid: Option<String>,
  pub notes:        Option<String>,
}

impl ResolveBody {
  fn reviewer(&self, admin: &Admin) -> String {
    self
      .reviewer_uid
      .clone()
      .filter(|uid| !uid.trim().is_empty())
      .unwrap_or_else(|| admin.username.clone())
  }
}

/// `POST /reviews/{id}/approve`
pub async fn approve<S, M, P>(
  admin: Admin,
  State(state): State<AppState<S, M, P>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ResolveBody>,
) -> Result<Json<Approval>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let reviewer = body.reviewer(&admin);
  let approval = state.pipeline.approve(id, &reviewer, body.notes).await?;
  Ok(Json(approval))
}

/// `POST /reviews/{id}/reject`
pub async fn reject<S, M, P>(
  admin: Admin,
  State(state): State<AppState<S, M, P>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ResolveBody>,
) -> Result<Json<EditorialReview>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let reviewer = body.reviewer(&admin);
  let review = state.pipeline.reject(id, &reviewer, body.notes).await?;
  Ok(Json(review))
}
