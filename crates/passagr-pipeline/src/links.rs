//! Periodic reachability check of source URLs, feeding reliability scores.

use std::{future::Future, time::Duration};

use chrono::Utc;
use passagr_core::{
  source::{MAX_RELIABILITY, SourceDocument},
  store::PipelineStore,
};
use reqwest::{Client, redirect};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Error, Result, error::BoxError};

/// Sources checked per run.
pub const DEFAULT_CHECK_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
  Ok,
  Error,
  NotFound,
}

impl LinkStatus {
  fn classify(probe: &Result<u16, BoxError>) -> Self {
    match probe {
      Ok(404) => Self::NotFound,
      Ok(status) if *status >= 400 => Self::Error,
      Ok(_) => Self::Ok,
      Err(_) => Self::Error,
    }
  }

  fn score_delta(self) -> i16 {
    match self {
      Self::Ok => 1,
      Self::Error => -1,
      Self::NotFound => -2,
    }
  }
}

/// Fetches the HTTP status of a URL.
pub trait LinkProbe: Send + Sync {
  fn probe(&self, url: &str) -> impl Future<Output = Result<u16, BoxError>> + Send;
}

/// Issues `HEAD` requests with a 10 second timeout, following at most five
/// redirects.
#[derive(Debug, Clone)]
pub struct HttpLinkProbe {
  client: Client,
}

impl HttpLinkProbe {
  pub fn new() -> Result<Self, reqwest::Error> {
    let client = Client::builder()
      .timeout(Duration::from_secs(10))
      .redirect(redirect::Policy::limited(5))
      .build()?;
    Ok(Self { client })
  }
}

impl LinkProbe for HttpLinkProbe {
  async fn probe(&self, url: &str) -> Result<u16, BoxError> {
    let response = self.client.head(url).send().await?;
    Ok(response.status().as_u16())
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkCheck {
  pub source_id:         Uuid,
  pub url:               String,
  pub status:            LinkStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub http_status:       Option<u16>,
  pub reliability_score: u8,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkCheckReport {
  pub ok:        usize,
  pub errors:    usize,
  pub not_found: usize,
  pub results:   Vec<LinkCheck>,
}

/// Probe up to `limit` sources, least recently checked first, and record the
/// adjusted reliability scores.
///
/// A source whose result cannot be stored is logged and still reported.
pub async fn check_links<S, P>(store: &S, probe: &P, limit: usize) -> Result<LinkCheckReport>
where
  S: PipelineStore,
  P: LinkProbe,
{
  let sources = store.sources_due_for_check(limit).await.map_err(Error::store)?;
  let mut report = LinkCheckReport::default();

  for source in sources {
    let check = check_one(store, probe, source).await;
    match check.status {
      LinkStatus::Ok => report.ok += 1,
      LinkStatus::Error => report.errors += 1,
      LinkStatus::NotFound => report.not_found += 1,
    }
    report.results.push(check);
  }

  info!(
    checked = report.results.len(),
    ok = report.ok,
    errors = report.errors,
    not_found = report.not_found,
    "link check complete"
  );
  Ok(report)
}

async fn check_one<S: PipelineStore, P: LinkProbe>(
  store: &S,
  probe: &P,
  source: SourceDocument,
) -> LinkCheck {
  let result = probe.probe(&source.url).await;
  let status = LinkStatus::classify(&result);
  if let Err(e) = &result {
    warn!(source_id = %source.source_id, url = %source.url, error = %e, "link probe failed");
  }

  let score = (i16::from(source.reliability_score) + status.score_delta())
    .clamp(0, i16::from(MAX_RELIABILITY)) as u8;
  if let Err(e) = store.record_source_check(source.source_id, score, Utc::now()).await {
    warn!(source_id = %source.source_id, error = %e, "could not record link check");
  }

  LinkCheck {
    source_id: source.source_id,
    url: source.url,
    status,
    http_status: result.ok(),
    reliability_score: score,
  }
}
