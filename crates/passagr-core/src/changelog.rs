//! The changelog: one immutable entry per publish.
//!
//! Entries are append-only. Replaying an entity's entries in chronological
//! order reproduces its current field values; see [`replay`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  diff::{ChangeType, DiffField},
  entity::{EntityType, Fields},
};

// ─── Attribution ─────────────────────────────────────────────────────────────

/// Who caused a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
  /// Auto-published by the pipeline without human review.
  Automated,
  /// Published after a reviewer approved the change.
  Reviewer(String),
}

impl Attribution {
  /// The marker stored in [`ChangelogEntry::created_by`].
  pub fn marker(&self) -> String {
    match self {
      Self::Automated => "automated-publisher".to_owned(),
      Self::Reviewer(uid) => format!("reviewer:{uid}"),
    }
  }
}

// ─── Entries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogEntry {
  pub changelog_id: Uuid,
  pub entity_type:  EntityType,
  pub entity_id:    Uuid,
  pub change_type:  ChangeType,
  pub diff_summary: String,
  pub diff_fields:  Vec<DiffField>,
  /// The complete field set as published by this entry.
  pub snapshot:     Fields,
  pub created_by:   String,
  pub source_ids:   Vec<Uuid>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::PipelineStore::append_changelog`]. The id and
/// `created_at` are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChangelogEntry {
  pub entity_type:  EntityType,
  pub entity_id:    Uuid,
  pub change_type:  ChangeType,
  pub diff_summary: String,
  pub diff_fields:  Vec<DiffField>,
  pub snapshot:     Fields,
  pub created_by:   String,
  pub source_ids:   Vec<Uuid>,
}

// ─── Replay ──────────────────────────────────────────────────────────────────

/// Rebuild an entity's fields from its changelog, oldest entry first.
///
/// An `add` entry resets the state to its snapshot; an `update` applies its
/// diff fields on top of the current state; a `remove` leaves the fields as
/// they were (it only changes visibility). Returns `None` if no entry ever
/// added the entity.
pub fn replay<'a>(entries: impl IntoIterator<Item = &'a ChangelogEntry>) -> Option<Fields> {
  let mut state: Option<Fields> = None;
  for entry in entries {
    match entry.change_type {
      ChangeType::Add => state = Some(entry.snapshot.clone()),
      ChangeType::Update => {
        if let Some(fields) = state.as_mut() {
          for change in &entry.diff_fields {
            apply(fields, &change.field, change.to.clone());
          }
        }
      }
      ChangeType::Remove => {}
    }
  }
  state
}

/// Set (or, for `None`, delete) the value at a dotted path.
fn apply(fields: &mut Fields, path: &str, value: Option<Value>) {
  let mut segments: Vec<&str> = path.split('.').collect();
  let Some(last) = segments.pop() else { return };

  let mut cursor = fields;
  for segment in segments {
    let slot = cursor
      .entry(segment.to_owned())
      .or_insert_with(|| Value::Object(Fields::new()));
    if !slot.is_object() {
      *slot = Value::Object(Fields::new());
    }
    let Value::Object(next) = slot else { return };
    cursor = next;
  }

  match value {
    Some(v) => {
      cursor.insert(last.to_owned(), v);
    }
    None => {
      cursor.remove(last);
    }
  }
}
