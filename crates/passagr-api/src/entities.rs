//! Handlers for published entities and their changelog.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/entities` | Optional `?type=country&status=published` |
//! | `GET`  | `/entities/{id}` | 404 if not found |
//! | `GET`  | `/entities/{id}/changelog` | Oldest first |
//! | `POST` | `/entities/{id}/unpublish` | Attributed to the authenticated editor |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use passagr_core::{
  changelog::{Attribution, ChangelogEntry},
  entity::{EntityStatus, EntityType, PublishedEntity},
  store::PipelineStore,
};
use passagr_pipeline::{links::LinkProbe, model::ExtractionModel, publisher::Publication};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Admin, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(rename = "type")]
  pub entity_type: Option<EntityType>,
  pub status:      Option<EntityStatus>,
}

/// `GET /entities[?type=<type>&status=<status>]`
pub async fn list<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<PublishedEntity>>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let entities = state
    .pipeline
    .store()
    .list_entities(params.entity_type, params.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entities))
}

async fn find<S: PipelineStore>(store: &S, id: Uuid) -> Result<PublishedEntity, ApiError> {
  store
    .get_entity(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))
}

/// `GET /entities/{id}`
pub async fn get_one<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Path(id): Path<Uuid>,
) -> Result<Json<PublishedEntity>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  Ok(Json(find(state.pipeline.store().as_ref(), id).await?))
}

/// `GET /entities/{id}/changelog`
pub async fn changelog<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChangelogEntry>>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let store = state.pipeline.store();
  find(store.as_ref(), id).await?;
  let entries = store.changelog_for(id).await.map_err(ApiError::store)?;
  Ok(Json(entries))
}

/// `POST /entities/{id}/unpublish`
pub async fn unpublish<S, M, P>(
  admin: Admin,
  State(state): State<AppState<S, M, P>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Publication>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let attribution = Attribution::Reviewer(admin.username);
  let publication = state.pipeline.publisher().unpublish(id, &attribution).await?;
  Ok(Json(publication))
}
