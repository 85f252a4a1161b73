//! Scheduled jobs, called by an external cron with the `x-cron-secret` header.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/jobs/freshness-scan` | Enqueues refresh runs for stale entities |
//! | `POST` | `/jobs/link-check` | Probes sources and adjusts reliability |

use std::{sync::Arc, time::Instant};

use axum::{Json, extract::State};
use chrono::Utc;
use passagr_core::store::PipelineStore;
use passagr_pipeline::{
  freshness::{self, StaleEntity},
  links::{self, DEFAULT_CHECK_LIMIT, LinkProbe},
  model::ExtractionModel,
};
use serde::Serialize;
use tracing::info;

use crate::{AppState, auth::Cron, error::ApiError};

fn elapsed_ms(started: Instant) -> u64 {
  u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ─── Freshness ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FreshnessScanResponse {
  pub stale_entities_found: usize,
  pub tasks_enqueued:       usize,
  pub duration_ms:          u64,
  pub stale:                Vec<StaleEntity>,
}

/// `POST /jobs/freshness-scan`
///
/// Responds once the refresh runs are enqueued; the runs themselves continue
/// in the background.
pub async fn freshness_scan<S, M, P>(
  _: Cron,
  State(state): State<AppState<S, M, P>>,
) -> Result<Json<FreshnessScanResponse>, ApiError>
where
  S: PipelineStore + 'static,
  M: ExtractionModel + 'static,
  P: LinkProbe,
{
  let started = Instant::now();
  let store = state.pipeline.store();
  let stale = freshness::scan(store.as_ref(), Utc::now()).await?;
  let tasks = freshness::plan_refresh(store.as_ref(), &stale).await?;
  let tasks_enqueued = tasks.len();

  if !tasks.is_empty() {
    let pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
      pipeline.run_batch(tasks).await;
    });
  }

  info!(stale = stale.len(), tasks_enqueued, "freshness scan enqueued refresh runs");
  Ok(Json(FreshnessScanResponse {
    stale_entities_found: stale.len(),
    tasks_enqueued,
    duration_ms: elapsed_ms(started),
    stale,
  }))
}

// ─── Links ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LinkCheckResponse {
  pub checked:     usize,
  pub ok:          usize,
  pub errors:      usize,
  pub not_found:   usize,
  pub duration_ms: u64,
  pub results:     Vec<links::LinkCheck>,
}

/// `POST /jobs/link-check`
pub async fn link_check<S, M, P>(
  _: Cron,
  State(state): State<AppState<S, M, P>>,
) -> Result<Json<LinkCheckResponse>, ApiError>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  let started = Instant::now();
  let report =
    links::check_links(state.pipeline.store().as_ref(), state.probe.as_ref(), DEFAULT_CHECK_LIMIT)
      .await?;

  Ok(Json(LinkCheckResponse {
    checked:     report.results.len(),
    ok:          report.ok,
    errors:      report.errors,
    not_found:   report.not_found,
    duration_ms: elapsed_ms(started),
    results:     report.results,
  }))
}
