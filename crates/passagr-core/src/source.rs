//! Source documents: raw fetched content the extractor reads from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound of [`SourceDocument::reliability_score`].
pub const MAX_RELIABILITY: u8 = 10;

/// Score assigned to a newly registered source.
pub const DEFAULT_RELIABILITY: u8 = 5;

/// A fetched web page or document. Read-only to the pipeline; only the link
/// checker adjusts `reliability_score` and `last_checked_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
  pub source_id:         Uuid,
  pub url:               String,
  pub title:             Option<String>,
  pub publisher:         Option<String>,
  pub content_type:      Option<String>,
  /// Readable text extracted by the fetcher; what the extractor consumes.
  pub excerpt:           Option<String>,
  pub fetched_at:        DateTime<Utc>,
  pub last_checked_at:   Option<DateTime<Utc>>,
  pub reliability_score: u8,
}

/// Input to [`crate::store::PipelineStore::upsert_source`]. Sources are keyed
/// by URL; registering the same URL again refreshes the content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSource {
  pub url:          String,
  pub title:        Option<String>,
  pub publisher:    Option<String>,
  pub content_type: Option<String>,
  pub excerpt:      Option<String>,
}

impl NewSource {
  pub fn new(url: impl Into<String>, excerpt: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      excerpt: Some(excerpt.into()),
      ..Default::default()
    }
  }
}
