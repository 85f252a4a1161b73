//! JSON HTTP API for passagr: the editorial review surface, entity and source
//! administration, pipeline runs, and the scheduled job endpoints.
//!
//! Exposes an axum [`Router`] over a [`Pipeline`] built on any
//! [`PipelineStore`]. TLS and tracing layers are the caller's responsibility.

pub mod auth;
pub mod entities;
pub mod error;
pub mod jobs;
pub mod reviews;
pub mod runs;
pub mod sources;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::State,
  routing::{get, post},
};
use passagr_core::{policy::CriticalFields, store::PipelineStore};
use passagr_pipeline::{Pipeline, links::LinkProbe, model::ExtractionModel};

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, M, P> {
  pub pipeline: Arc<Pipeline<S, M>>,
  pub probe:    Arc<P>,
  pub auth:     Arc<AuthConfig>,
}

impl<S, M, P> Clone for AppState<S, M, P> {
  fn clone(&self) -> Self {
    Self {
      pipeline: Arc::clone(&self.pipeline),
      probe:    Arc::clone(&self.probe),
      auth:     Arc::clone(&self.auth),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router<S, M, P>(state: AppState<S, M, P>) -> Router
where
  S: PipelineStore + 'static,
  M: ExtractionModel + 'static,
  P: LinkProbe + 'static,
{
  Router::new()
    // Reviews
    .route("/reviews",                 get(reviews::list::<S, M, P>))
    .route("/reviews/{id}",            get(reviews::get_one::<S, M, P>))
    .route("/reviews/{id}/approve",    post(reviews::approve::<S, M, P>))
    .route("/reviews/{id}/reject",     post(reviews::reject::<S, M, P>))
    // Entities
    .route("/entities",                get(entities::list::<S, M, P>))
    .route("/entities/{id}",           get(entities::get_one::<S, M, P>))
    .route("/entities/{id}/changelog", get(entities::changelog::<S, M, P>))
    .route("/entities/{id}/unpublish", post(entities::unpublish::<S, M, P>))
    // Sources
    .route("/sources",                 post(sources::create::<S, M, P>))
    .route("/sources/{id}",            get(sources::get_one::<S, M, P>))
    // Pipeline
    .route("/pipeline/runs",           post(runs::run::<S, M, P>))
    .route("/pipeline/candidates",     post(runs::process::<S, M, P>))
    .route("/pipeline/batch",          post(runs::batch::<S, M, P>))
    .route("/critical-fields",         get(critical_fields::<S, M, P>))
    // Jobs
    .route("/jobs/freshness-scan",     post(jobs::freshness_scan::<S, M, P>))
    .route("/jobs/link-check",         post(jobs::link_check::<S, M, P>))
    .with_state(state)
}

/// `GET /critical-fields`: the configured set, for audit.
async fn critical_fields<S, M, P>(
  _: auth::Admin,
  State(state): State<AppState<S, M, P>>,
) -> Json<CriticalFields>
where
  S: PipelineStore,
  M: ExtractionModel,
  P: LinkProbe,
{
  Json(state.pipeline.critical_fields().clone())
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use passagr_core::{
    changelog::NewChangelogEntry,
    diff::ChangeType,
    entity::{EntityStatus, EntityType, EntityWrite},
    policy::default_freshness_policies,
  };
  use passagr_pipeline::{
    PipelineConfig,
    error::BoxError,
    model::{ExtractionRequest, ModelError},
    signals::Signals,
  };
  use passagr_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  /// Answers every prompt with a fixed document, or fails when empty.
  struct StubModel(Mutex<Option<String>>);

  impl ExtractionModel for StubModel {
    async fn complete(&self, _: ExtractionRequest) -> Result<String, ModelError> {
      self
        .0
        .lock()
        .map_err(|_| ModelError::EmptyResponse)?
        .clone()
        .ok_or(ModelError::EmptyResponse)
    }
  }

  struct OkProbe;

  impl LinkProbe for OkProbe {
    async fn probe(&self, _: &str) -> Result<u16, BoxError> { Ok(200) }
  }

  type TestState = AppState<SqliteStore, StubModel, OkProbe>;

  async fn make_state(answer: Option<Value>) -> TestState {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    store.seed_freshness_policies(&default_freshness_policies()).await.unwrap();

    let model = StubModel(Mutex::new(answer.map(|v| v.to_string())));
    let config = PipelineConfig { retry_backoff_ms: 1, ..Default::default() };
    let pipeline =
      Pipeline::new(store, model, CriticalFields::default(), Signals::disabled(), config);

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();

    AppState {
      pipeline: Arc::new(pipeline),
      probe:    Arc::new(OkProbe),
      auth:     Arc::new(AuthConfig {
        username:      "editor".to_owned(),
        password_hash: hash,
        cron_secret:   Some("tick".to_owned()),
      }),
    }
  }

  fn admin() -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Basic {}", B64.encode("editor:secret")))
  }

  fn cron() -> (header::HeaderName, String) {
    (header::HeaderName::from_static(auth::CRON_SECRET_HEADER), "tick".to_owned())
  }

  async fn call(
    state: &TestState,
    method: &str,
    uri: &str,
    auth: Option<(header::HeaderName, String)>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((name, value)) = auth {
      builder = builder.header(name, value);
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = router(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
  }

  fn country() -> Value {
    json!({
      "name": "Portugal",
      "iso2": "PT",
      "lgbtq_rights_index": 5,
      "abortion_access_status": "Legal and accessible",
      "hate_crime_law_snapshot": "Covered",
    })
  }

  fn candidate(fields: Value) -> Value {
    let mut c = fields;
    c["entity_type"] = json!("country");
    c["source_id"] = json!(Uuid::new_v4());
    c["last_verified_at"] = json!("2026-01-01T00:00:00Z");
    c
  }

  // ── Auth ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn editor_routes_require_credentials() {
    let state = make_state(None).await;
    let resp = router(state.clone())
      .oneshot(Request::builder().uri("/reviews").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let (status, body) = call(&state, "GET", "/reviews", Some(admin()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
  }

  #[tokio::test]
  async fn job_routes_require_the_cron_secret() {
    let state = make_state(None).await;
    let (status, _) = call(&state, "POST", "/jobs/link-check", Some(admin()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  // ── Review flow ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn new_entity_is_reviewed_then_approved_once() {
    let state = make_state(None).await;
    let (status, outcome) = call(
      &state,
      "POST",
      "/pipeline/candidates",
      Some(admin()),
      Some(candidate(country())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "pending_review");
    assert_eq!(outcome["reason"], "new_entity");
    let review_id = outcome["review_id"].as_str().unwrap().to_owned();

    let (_, pending) = call(&state, "GET", "/reviews?status=pending", Some(admin()), None).await;
    assert_eq!(pending.as_array().map(Vec::len), Some(1));

    let (status, detail) =
      call(&state, "GET", &format!("/reviews/{review_id}"), Some(admin()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail["current"].is_null());
    assert_eq!(detail["proposed"]["name"], "Portugal");

    let uri = format!("/reviews/{review_id}/approve");
    let (status, approval) =
      call(&state, "POST", &uri, Some(admin()), Some(json!({ "notes": "checked" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approval["review"]["status"], "approved");
    assert_eq!(approval["review"]["reviewer_uid"], "editor");
    assert_eq!(approval["publication"]["changelog"]["created_by"], "reviewer:editor");

    let entity_id = approval["publication"]["entity"]["entity_id"].as_str().unwrap().to_owned();
    let (status, log) =
      call(&state, "GET", &format!("/entities/{entity_id}/changelog"), Some(admin()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log.as_array().map(Vec::len), Some(1));

    let (status, _) = call(&state, "POST", &uri, Some(admin()), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn review_detail_lists_duplicate_additions() {
    let state = make_state(None).await;
    let body = candidate(country());
    let mut review_ids = vec![];
    for _ in 0..2 {
      let (_, outcome) =
        call(&state, "POST", "/pipeline/candidates", Some(admin()), Some(body.clone())).await;
      review_ids.push(outcome["review_id"].as_str().unwrap().to_owned());
    }

    let (status, detail) =
      call(&state, "GET", &format!("/reviews/{}", review_ids[0]), Some(admin()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["related_additions"], json!([review_ids[1]]));
  }

  #[tokio::test]
  async fn candidate_with_a_mismatched_type_is_unprocessable() {
    let state = make_state(None).await;
    let (_, outcome) = call(
      &state,
      "POST",
      "/pipeline/candidates",
      Some(admin()),
      Some(candidate(country())),
    )
    .await;
    let review_id = outcome["review_id"].as_str().unwrap().to_owned();
    let uri = format!("/reviews/{review_id}/approve");
    let (_, approval) = call(&state, "POST", &uri, Some(admin()), Some(json!({}))).await;
    let entity_id = approval["publication"]["entity"]["entity_id"].clone();

    let mut visa = candidate(json!({ "country_id": entity_id, "name": "D7", "type": "work" }));
    visa["entity_type"] = json!("visa_path");
    visa["entity_id"] = entity_id;
    let (status, body) =
      call(&state, "POST", "/pipeline/candidates", Some(admin()), Some(visa)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("is a country"));
  }

  #[tokio::test]
  async fn unknown_review_is_not_found() {
    let state = make_state(None).await;
    let uri = format!("/reviews/{}/reject", Uuid::new_v4());
    let (status, _) = call(&state, "POST", &uri, Some(admin()), Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Runs ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn run_extracts_from_a_stored_source() {
    let state = make_state(Some(country())).await;
    let (status, source) = call(
      &state,
      "POST",
      "/sources",
      Some(admin()),
      Some(json!({ "url": "https://gov.example/pt", "excerpt": "Portugal facts" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let task = json!({ "source_id": source["source_id"], "entity_type": "country" });
    let (status, outcome) =
      call(&state, "POST", "/pipeline/runs", Some(admin()), Some(task)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "pending_review");

    let missing = json!({ "source_id": Uuid::new_v4(), "entity_type": "country" });
    let (status, _) = call(&state, "POST", "/pipeline/runs", Some(admin()), Some(missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn extraction_failure_is_unprocessable() {
    let state = make_state(None).await;
    let (_, source) = call(
      &state,
      "POST",
      "/sources",
      Some(admin()),
      Some(json!({ "url": "https://gov.example/pt", "excerpt": "Portugal facts" })),
    )
    .await;
    let task = json!({ "source_id": source["source_id"], "entity_type": "country" });
    let (status, _) = call(&state, "POST", "/pipeline/runs", Some(admin()), Some(task)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  // ── Entities ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unpublish_then_unpublish_again_conflicts() {
    let state = make_state(None).await;
    let id = Uuid::new_v4();
    state
      .pipeline
      .store()
      .upsert_entity(
        EntityWrite {
          entity_id:        id,
          entity_type:      EntityType::Country,
          fields:           country().as_object().cloned().unwrap(),
          status:           EntityStatus::Published,
          last_verified_at: chrono::Utc::now(),
        },
        None,
      )
      .await
      .unwrap();

    let uri = format!("/entities/{id}/unpublish");
    let (status, body) = call(&state, "POST", &uri, Some(admin()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entity"]["status"], "unpublished");
    assert_eq!(body["changelog"]["change_type"], "remove");

    let (status, _) = call(&state, "POST", &uri, Some(admin()), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) =
      call(&state, "GET", &format!("/entities/{}", Uuid::new_v4()), Some(admin()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Jobs ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn freshness_scan_enqueues_stale_entities() {
    let state = make_state(None).await;
    let store = state.pipeline.store();
    let id = Uuid::new_v4();
    let entity = store
      .upsert_entity(
        EntityWrite {
          entity_id:        id,
          entity_type:      EntityType::Country,
          fields:           country().as_object().cloned().unwrap(),
          status:           EntityStatus::Published,
          last_verified_at: chrono::Utc::now() - chrono::Duration::days(45),
        },
        None,
      )
      .await
      .unwrap();
    store
      .append_changelog(NewChangelogEntry {
        entity_type:  EntityType::Country,
        entity_id:    id,
        change_type:  ChangeType::Add,
        diff_summary: "New country added.".into(),
        diff_fields:  vec![],
        snapshot:     entity.fields,
        created_by:   "automated-publisher".into(),
        source_ids:   vec![Uuid::new_v4()],
      })
      .await
      .unwrap();

    let (status, body) = call(&state, "POST", "/jobs/freshness-scan", Some(cron()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stale_entities_found"], 1);
    assert_eq!(body["tasks_enqueued"], 1);
    assert_eq!(body["stale"][0]["policy"], "abortion_access_status");
  }

  #[tokio::test]
  async fn link_check_reports_counts() {
    let state = make_state(None).await;
    call(
      &state,
      "POST",
      "/sources",
      Some(admin()),
      Some(json!({ "url": "https://gov.example/pt" })),
    )
    .await;

    let (status, body) = call(&state, "POST", "/jobs/link-check", Some(cron()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checked"], 1);
    assert_eq!(body["ok"], 1);
    assert_eq!(body["results"][0]["reliability_score"], 6);
  }
}
