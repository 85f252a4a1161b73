//! Handlers for `/sources`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sources` | Upsert by URL; body is a source document |
//! | `GET`  | `/sources/{id}` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use passagr_core::{
  source::{NewSource, SourceDocument},
  store::PipelineStore,
};
use passagr_pipeline::{links::LinkProbe, model::ExtractionModel};
use uuid::Uuid;

use crate::{AppState, auth::Admin, error::ApiError};

/// `POST /sources`, body: `{"url":"…","excerpt":"…"}`
pub async fn create<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Json(body): Json<NewSource>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  if body.url.trim().is_empty() {
    return Err(ApiError::BadRequest("url must not be empty".to_owned()));
  }
  let source = state.pipeline.store().upsert_source(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(source)))
}

/// `GET /sources/{id}`
pub async fn get_one<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SourceDocument>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let source = state
    .pipeline
    .store()
    .get_source(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("source {id} not found")))?;
  Ok(Json(source))
}
