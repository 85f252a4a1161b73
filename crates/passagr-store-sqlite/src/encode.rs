//! Encoding and decoding helpers between passagr domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond precision
//! so they sort lexically. Field sets, diffs and id lists are stored as compact
//! JSON. Enums are stored as their `strum` string form.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use passagr_core::{
  changelog::ChangelogEntry,
  diff::{DiffField, DiffOutput},
  entity::{CandidateEntity, EntityType, Fields, PublishedEntity},
  policy::FreshnessPolicy,
  review::EditorialReview,
  source::SourceDocument,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

/// Parse any `strum`-backed enum column.
pub fn decode_enum<T: FromStr>(what: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_fields(fields: &Fields) -> Result<String> {
  Ok(serde_json::to_string(fields)?)
}

pub fn encode_diff_fields(diff: &[DiffField]) -> Result<String> {
  Ok(serde_json::to_string(diff)?)
}

pub fn encode_ids(ids: &[Uuid]) -> Result<String> { Ok(serde_json::to_string(ids)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SOURCE_COLUMNS: &str = "source_id, url, title, publisher, content_type, \
   excerpt, fetched_at, last_checked_at, reliability_score";

/// Raw strings read directly from a `sources` row.
pub struct RawSource {
  pub source_id:         String,
  pub url:               String,
  pub title:             Option<String>,
  pub publisher:         Option<String>,
  pub content_type:      Option<String>,
  pub excerpt:           Option<String>,
  pub fetched_at:        String,
  pub last_checked_at:   Option<String>,
  pub reliability_score: i64,
}

impl RawSource {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      source_id:         row.get(0)?,
      url:               row.get(1)?,
      title:             row.get(2)?,
      publisher:         row.get(3)?,
      content_type:      row.get(4)?,
      excerpt:           row.get(5)?,
      fetched_at:        row.get(6)?,
      last_checked_at:   row.get(7)?,
      reliability_score: row.get(8)?,
    })
  }

  pub fn into_source(self) -> Result<SourceDocument> {
    let reliability_score = u8::try_from(self.reliability_score).map_err(|_| {
      Error::Decode(format!("reliability score out of range: {}", self.reliability_score))
    })?;
    Ok(SourceDocument {
      source_id: decode_uuid(&self.source_id)?,
      url: self.url,
      title: self.title,
      publisher: self.publisher,
      content_type: self.content_type,
      excerpt: self.excerpt,
      fetched_at: decode_dt(&self.fetched_at)?,
      last_checked_at: decode_opt_dt(self.last_checked_at)?,
      reliability_score,
    })
  }
}

pub const ENTITY_COLUMNS: &str = "entity_id, entity_type, fields_json, status, version, \
   last_verified_at, created_at, updated_at";

/// Raw strings read directly from an `entities` row.
pub struct RawEntity {
  pub entity_id:        String,
  pub entity_type:      String,
  pub fields_json:      String,
  pub status:           String,
  pub version:          i64,
  pub last_verified_at: String,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawEntity {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:        row.get(0)?,
      entity_type:      row.get(1)?,
      fields_json:      row.get(2)?,
      status:           row.get(3)?,
      version:          row.get(4)?,
      last_verified_at: row.get(5)?,
      created_at:       row.get(6)?,
      updated_at:       row.get(7)?,
    })
  }

  pub fn into_entity(self) -> Result<PublishedEntity> {
    Ok(PublishedEntity {
      entity_id:        decode_uuid(&self.entity_id)?,
      entity_type:      EntityType::parse(&self.entity_type)?,
      fields:           serde_json::from_str(&self.fields_json)?,
      status:           decode_enum("entity status", &self.status)?,
      version:          self.version,
      last_verified_at: decode_dt(&self.last_verified_at)?,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

pub const CHANGELOG_COLUMNS: &str = "changelog_id, entity_type, entity_id, change_type, \
   diff_summary, diff_fields_json, snapshot_json, created_by, source_ids_json, created_at";

/// Raw strings read directly from a `changelogs` row.
pub struct RawChangelog {
  pub changelog_id:     String,
  pub entity_type:      String,
  pub entity_id:        String,
  pub change_type:      String,
  pub diff_summary:     String,
  pub diff_fields_json: String,
  pub snapshot_json:    String,
  pub created_by:       String,
  pub source_ids_json:  String,
  pub created_at:       String,
}

impl RawChangelog {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      changelog_id:     row.get(0)?,
      entity_type:      row.get(1)?,
      entity_id:        row.get(2)?,
      change_type:      row.get(3)?,
      diff_summary:     row.get(4)?,
      diff_fields_json: row.get(5)?,
      snapshot_json:    row.get(6)?,
      created_by:       row.get(7)?,
      source_ids_json:  row.get(8)?,
      created_at:       row.get(9)?,
    })
  }

  pub fn into_entry(self) -> Result<ChangelogEntry> {
    Ok(ChangelogEntry {
      changelog_id: decode_uuid(&self.changelog_id)?,
      entity_type:  EntityType::parse(&self.entity_type)?,
      entity_id:    decode_uuid(&self.entity_id)?,
      change_type:  decode_enum("change type", &self.change_type)?,
      diff_summary: self.diff_summary,
      diff_fields:  serde_json::from_str(&self.diff_fields_json)?,
      snapshot:     serde_json::from_str(&self.snapshot_json)?,
      created_by:   self.created_by,
      source_ids:   serde_json::from_str(&self.source_ids_json)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const REVIEW_COLUMNS: &str = "review_id, entity_type, entity_id, status, reason, notes, \
   proposed_data_json, change_type, diff_summary, diff_fields_json, source_ids_json, \
   base_version, created_at, reviewer_uid, resolved_at";

/// Raw strings read directly from an `editorial_reviews` row.
pub struct RawReview {
  pub review_id:          String,
  pub entity_type:        String,
  pub entity_id:          Option<String>,
  pub status:             String,
  pub reason:             String,
  pub notes:              Option<String>,
  pub proposed_data_json: String,
  pub change_type:        String,
  pub diff_summary:       String,
  pub diff_fields_json:   String,
  pub source_ids_json:    String,
  pub base_version:       Option<i64>,
  pub created_at:         String,
  pub reviewer_uid:       Option<String>,
  pub resolved_at:        Option<String>,
}

impl RawReview {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      review_id:          row.get(0)?,
      entity_type:        row.get(1)?,
      entity_id:          row.get(2)?,
      status:             row.get(3)?,
      reason:             row.get(4)?,
      notes:              row.get(5)?,
      proposed_data_json: row.get(6)?,
      change_type:        row.get(7)?,
      diff_summary:       row.get(8)?,
      diff_fields_json:   row.get(9)?,
      source_ids_json:    row.get(10)?,
      base_version:       row.get(11)?,
      created_at:         row.get(12)?,
      reviewer_uid:       row.get(13)?,
      resolved_at:        row.get(14)?,
    })
  }

  pub fn into_review(self) -> Result<EditorialReview> {
    let proposed_data: CandidateEntity = serde_json::from_str(&self.proposed_data_json)?;
    let diff = DiffOutput {
      change_type:  decode_enum("change type", &self.change_type)?,
      diff_summary: self.diff_summary,
      diff_fields:  serde_json::from_str(&self.diff_fields_json)?,
      source_ids:   serde_json::from_str(&self.source_ids_json)?,
      base_version: self.base_version,
    };
    Ok(EditorialReview {
      review_id: decode_uuid(&self.review_id)?,
      entity_type: EntityType::parse(&self.entity_type)?,
      entity_id: self.entity_id.as_deref().map(decode_uuid).transpose()?,
      status: decode_enum("review status", &self.status)?,
      reason: decode_enum("review reason", &self.reason)?,
      notes: self.notes,
      proposed_data,
      diff,
      created_at: decode_dt(&self.created_at)?,
      reviewer_uid: self.reviewer_uid,
      resolved_at: decode_opt_dt(self.resolved_at)?,
    })
  }
}

/// Raw strings read directly from a `freshness_policies` row.
pub struct RawPolicy {
  pub key:         String,
  pub ttl_days:    i64,
  pub criticality: String,
}

impl RawPolicy {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { key: row.get(0)?, ttl_days: row.get(1)?, criticality: row.get(2)? })
  }

  pub fn into_policy(self) -> Result<FreshnessPolicy> {
    let ttl_days = u32::try_from(self.ttl_days)
      .map_err(|_| Error::Decode(format!("ttl out of range: {}", self.ttl_days)))?;
    Ok(FreshnessPolicy {
      key: self.key,
      ttl_days,
      criticality: decode_enum("criticality", &self.criticality)?,
    })
  }
}
