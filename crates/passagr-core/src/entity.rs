//! Entities: the countries, visa paths and nested rows the pipeline proposes
//! and publishes.
//!
//! A [`CandidateEntity`] is a proposal: it is produced once by the extractor
//! and then only read. A [`PublishedEntity`] is the canonical row the public
//! surface serves; it changes only through the publisher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// The type-specific field set of an entity, keyed by field name.
pub type Fields = Map<String, Value>;

// ─── Entity type ─────────────────────────────────────────────────────────────

/// The kind of record an entity represents.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
  Country,
  VisaPath,
  Requirement,
  Step,
}

impl EntityType {
  /// Parse the snake_case discriminant stored in the database.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownEntityType(s.to_owned()))
  }

  /// Plural collection name, used for public paths and search collections.
  pub fn collection(self) -> &'static str {
    match self {
      Self::Country => "countries",
      Self::VisaPath => "visa_paths",
      Self::Requirement => "requirements",
      Self::Step => "steps",
    }
  }

  /// Public path of a single entity, purged from caches on publish.
  pub fn public_path(self, id: Uuid) -> String {
    format!("/public/{}/{id}", self.collection())
  }
}

// ─── Candidate ───────────────────────────────────────────────────────────────

/// The proposed state of an entity, as extracted from a source document.
///
/// `entity_id == None` means the candidate describes a new entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntity {
  pub entity_type:      EntityType,
  #[serde(default)]
  pub entity_id:        Option<Uuid>,
  /// The [`SourceDocument`](crate::source::SourceDocument) this candidate was
  /// derived from.
  pub source_id:        Uuid,
  pub last_verified_at: DateTime<Utc>,
  #[serde(flatten)]
  pub fields:           Fields,
}

impl CandidateEntity {
  pub fn field(&self, key: &str) -> Option<&Value> { self.fields.get(key) }

  /// A human-readable label: `name`, falling back to `iso2`, then the type.
  pub fn display_name(&self) -> String {
    ["name", "iso2", "label", "title"]
      .iter()
      .find_map(|k| self.field(k).and_then(Value::as_str))
      .filter(|s| !s.trim().is_empty())
      .map(str::to_owned)
      .unwrap_or_else(|| self.entity_type.to_string())
  }
}

// ─── Published ───────────────────────────────────────────────────────────────

/// Visibility of a canonical entity row.
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
#[strum(serialize_all = "snake_case")]
pub enum EntityStatus {
  Published,
  Unpublished,
}

/// The canonical, currently-persisted state of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedEntity {
  pub entity_id:        Uuid,
  pub entity_type:      EntityType,
  pub fields:           Fields,
  pub status:           EntityStatus,
  /// Monotonic write counter; the precondition for optimistic concurrency.
  pub version:          i64,
  pub last_verified_at: DateTime<Utc>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// Input to [`crate::store::PipelineStore::upsert_entity`]. `version`,
/// `created_at` and `updated_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct EntityWrite {
  pub entity_id:        Uuid,
  pub entity_type:      EntityType,
  pub fields:           Fields,
  pub status:           EntityStatus,
  pub last_verified_at: DateTime<Utc>,
}
