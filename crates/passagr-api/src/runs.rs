//! Handlers that push work through the pipeline.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/pipeline/runs` | Body: an extraction task |
//! | `POST` | `/pipeline/candidates` | Body: an already-extracted candidate |
//! | `POST` | `/pipeline/batch` | Body: `{"tasks":[…]}`; per-item report |

use axum::{Json, extract::State};
use passagr_core::{entity::CandidateEntity, store::PipelineStore};
use passagr_pipeline::{
  BatchReport, Outcome, extractor::ExtractionTask, links::LinkProbe, model::ExtractionModel,
};
use serde::Deserialize;

use crate::{AppState, auth::Admin, error::ApiError};

/// `POST /pipeline/runs`
pub async fn run<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Json(task): Json<ExtractionTask>,
) -> Result<Json<Outcome>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  Ok(Json(state.pipeline.run(&task).await?))
}

/// `POST /pipeline/candidates`
pub async fn process<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Json(candidate): Json<CandidateEntity>,
) -> Result<Json<Outcome>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  Ok(Json(state.pipeline.process(candidate).await?))
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
  pub tasks: Vec<ExtractionTask>,
}

/// `POST /pipeline/batch`
pub async fn batch<S, M, P>(
  _: Admin,
  State(state): State<AppState<S, M, P>>,
  Json(body): Json<BatchBody>,
) -> Result<Json<BatchReport>, ApiError>
where
  S: PipelineStore + 'static,
  M: ExtractionModel + 'static,
  P: LinkProbe,
{
  if body.tasks.is_empty() {
    return Err(ApiError::BadRequest("no tasks given".to_owned()));
  }
  Ok(Json(state.pipeline.run_batch(body.tasks).await))
}
