//! Stage 3: field-level diff against the published entity.

use std::{collections::BTreeSet, sync::Arc};

use passagr_core::{
  diff::{ChangeType, DiffField, DiffOutput},
  entity::{CandidateEntity, EntityStatus, Fields},
  store::PipelineStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// What to do when the current entity cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailurePolicy {
  /// Assume the entity is new. The change goes to review, and the publisher's
  /// insert-only write refuses to overwrite a row that does exist.
  #[default]
  TreatAsAdd,
  /// Stop processing the candidate with [`Error::Lookup`].
  Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
  Changed(DiffOutput),
  /// Candidate and published fields are identical; nothing downstream runs.
  Unchanged,
}

pub struct Differ<S> {
  store:          Arc<S>,
  lookup_failure: LookupFailurePolicy,
}

impl<S: PipelineStore> Differ<S> {
  pub fn new(store: Arc<S>, lookup_failure: LookupFailurePolicy) -> Self {
    Self { store, lookup_failure }
  }

  pub async fn diff(&self, candidate: &CandidateEntity) -> Result<DiffOutcome> {
    let Some(entity_id) = candidate.entity_id else {
      return Ok(DiffOutcome::Changed(addition(candidate)));
    };

    let current = match self.store.get_entity(entity_id).await {
      Ok(Some(current)) => current,
      Ok(None) => {
        warn!(%entity_id, "candidate references an unknown entity; treating as add");
        return Ok(DiffOutcome::Changed(addition(candidate)));
      }
      Err(e) => match self.lookup_failure {
        LookupFailurePolicy::TreatAsAdd => {
          warn!(%entity_id, error = %e, "entity lookup failed; treating as add");
          return Ok(DiffOutcome::Changed(addition(candidate)));
        }
        LookupFailurePolicy::Abort => {
          return Err(Error::Lookup { entity_id, source: Box::new(e) });
        }
      },
    };

    if current.entity_type != candidate.entity_type {
      warn!(
        %entity_id,
        stored = %current.entity_type,
        proposed = %candidate.entity_type,
        "candidate type does not match the stored entity"
      );
      return Err(Error::EntityTypeMismatch {
        entity_id,
        stored: current.entity_type,
        proposed: candidate.entity_type,
      });
    }

    let diff_fields = diff_fields(&current.fields, &candidate.fields);

    if current.status == EntityStatus::Unpublished {
      info!(%entity_id, "candidate would republish an unpublished entity");
      return Ok(DiffOutcome::Changed(DiffOutput {
        change_type:  ChangeType::Add,
        diff_summary: format!(
          "Republication proposed for unpublished {}: {} fields modified.",
          candidate.entity_type,
          diff_fields.len()
        ),
        diff_fields,
        source_ids:   vec![candidate.source_id],
        base_version: Some(current.version),
      }));
    }

    if diff_fields.is_empty() {
      debug!(%entity_id, "no changes detected");
      return Ok(DiffOutcome::Unchanged);
    }

    Ok(DiffOutcome::Changed(DiffOutput {
      change_type:  ChangeType::Update,
      diff_summary: format!(
        "Changes detected for {}: {} fields modified.",
        candidate.entity_type,
        diff_fields.len()
      ),
      diff_fields,
      source_ids:   vec![candidate.source_id],
      base_version: Some(current.version),
    }))
  }
}

fn addition(candidate: &CandidateEntity) -> DiffOutput {
  DiffOutput {
    change_type:  ChangeType::Add,
    diff_summary: format!("New {} added.", candidate.entity_type),
    diff_fields:  vec![],
    source_ids:   vec![candidate.source_id],
    base_version: None,
  }
}

/// Structural diff of two field sets.
///
/// Objects are walked recursively and reported by dotted path. Arrays are
/// compared whole: a changed array is one entry carrying both arrays. Output
/// is ordered by path, so the same inputs always give the same diff.
pub fn diff_fields(current: &Fields, proposed: &Fields) -> Vec<DiffField> {
  let mut out = Vec::new();
  diff_objects(current, proposed, "", &mut out);
  out
}

fn diff_objects(current: &Fields, proposed: &Fields, prefix: &str, out: &mut Vec<DiffField>) {
  let keys: BTreeSet<&String> = current.keys().chain(proposed.keys()).collect();
  for key in keys {
    let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
    match (current.get(key), proposed.get(key)) {
      (Some(Value::Object(a)), Some(Value::Object(b))) => diff_objects(a, b, &path, out),
      (Some(a), Some(b)) if a == b => {}
      (from, to) => out.push(DiffField::new(path, from.cloned(), to.cloned())),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use chrono::Utc;
  use passagr_core::entity::{EntityStatus, EntityType, PublishedEntity};
  use serde_json::json;
  use uuid::Uuid;

  use super::*;
  use crate::testing::MemoryStore;

  fn fields(v: Value) -> Fields { v.as_object().cloned().unwrap_or_default() }

  fn candidate(entity_id: Option<Uuid>, v: Value) -> CandidateEntity {
    CandidateEntity {
      entity_type: EntityType::Country,
      entity_id,
      source_id: Uuid::nil(),
      last_verified_at: Utc::now(),
      fields: fields(v),
    }
  }

  fn published(store: &MemoryStore, v: Value) -> Uuid {
    let id = Uuid::new_v4();
    store.put_entity(PublishedEntity {
      entity_id:        id,
      entity_type:      EntityType::Country,
      fields:           fields(v),
      status:           EntityStatus::Published,
      version:          3,
      last_verified_at: Utc::now(),
      created_at:       Utc::now(),
      updated_at:       Utc::now(),
    });
    id
  }

  #[tokio::test]
  async fn no_entity_id_is_an_addition() {
    let differ = Differ::new(Arc::new(MemoryStore::default()), LookupFailurePolicy::default());
    let out = differ
      .diff(&candidate(None, json!({ "lgbtq_rights_index": 5 })))
      .await
      .unwrap();
    let DiffOutcome::Changed(diff) = out else { panic!("expected a change") };
    assert_eq!(diff.change_type, ChangeType::Add);
    assert!(diff.diff_fields.is_empty());
    assert_eq!(diff.diff_summary, "New country added.");
    assert_eq!(diff.base_version, None);
    assert_eq!(diff.source_ids, vec![Uuid::nil()]);
  }

  #[tokio::test]
  async fn critical_field_change_is_reported() {
    let store = Arc::new(MemoryStore::default());
    let id = published(&store, json!({ "lgbtq_rights_index": 5 }));
    let differ = Differ::new(store, LookupFailurePolicy::default());

    let out = differ
      .diff(&candidate(Some(id), json!({ "lgbtq_rights_index": 4 })))
      .await
      .unwrap();
    let DiffOutcome::Changed(diff) = out else { panic!("expected a change") };
    assert_eq!(diff.change_type, ChangeType::Update);
    assert_eq!(diff.diff_fields, vec![DiffField::new(
      "lgbtq_rights_index",
      Some(json!(5)),
      Some(json!(4))
    )]);
    assert_eq!(diff.diff_summary, "Changes detected for country: 1 fields modified.");
    assert_eq!(diff.base_version, Some(3));
  }

  #[tokio::test]
  async fn type_mismatch_with_the_stored_entity_is_refused() {
    let store = Arc::new(MemoryStore::default());
    let id = published(&store, json!({ "lgbtq_rights_index": 5 }));
    let differ = Differ::new(store, LookupFailurePolicy::default());

    let mut c = candidate(Some(id), json!({ "name": "D7", "type": "work" }));
    c.entity_type = EntityType::VisaPath;
    assert!(matches!(
      differ.diff(&c).await,
      Err(Error::EntityTypeMismatch {
        stored: EntityType::Country,
        proposed: EntityType::VisaPath,
        ..
      })
    ));
  }

  #[tokio::test]
  async fn unpublished_entity_diffs_as_a_republication() {
    let store = Arc::new(MemoryStore::default());
    let id = published(&store, json!({ "healthcare_overview": "Old text" }));
    let mut hidden = store.get_entity(id).await.unwrap().unwrap();
    hidden.status = EntityStatus::Unpublished;
    store.put_entity(hidden);
    let differ = Differ::new(store, LookupFailurePolicy::default());

    let out = differ
      .diff(&candidate(Some(id), json!({ "healthcare_overview": "Old text" })))
      .await
      .unwrap();
    let DiffOutcome::Changed(diff) = out else { panic!("expected a change") };
    assert!(diff.is_republish());
    assert!(diff.diff_fields.is_empty());
    assert_eq!(diff.base_version, Some(3));
  }

  #[tokio::test]
  async fn identical_fields_are_unchanged_every_time() {
    let store = Arc::new(MemoryStore::default());
    let id = published(&store, json!({ "healthcare_overview": "Old text" }));
    let differ = Differ::new(store, LookupFailurePolicy::default());
    let c = candidate(Some(id), json!({ "healthcare_overview": "Old text" }));

    assert_eq!(differ.diff(&c).await.unwrap(), DiffOutcome::Unchanged);
    assert_eq!(differ.diff(&c).await.unwrap(), DiffOutcome::Unchanged);
  }

  #[tokio::test]
  async fn diff_is_deterministic() {
    let store = Arc::new(MemoryStore::default());
    let id = published(&store, json!({ "a": 1, "b": { "c": 2 } }));
    let differ = Differ::new(store, LookupFailurePolicy::default());
    let c = candidate(Some(id), json!({ "a": 2, "b": { "c": 3 }, "d": true }));

    assert_eq!(differ.diff(&c).await.unwrap(), differ.diff(&c).await.unwrap());
  }

  #[tokio::test]
  async fn unknown_entity_id_falls_back_to_addition() {
    let differ = Differ::new(Arc::new(MemoryStore::default()), LookupFailurePolicy::Abort);
    let out = differ.diff(&candidate(Some(Uuid::new_v4()), json!({}))).await.unwrap();
    assert!(matches!(out, DiffOutcome::Changed(d) if d.change_type == ChangeType::Add));
  }

  #[tokio::test]
  async fn lookup_failure_follows_policy() {
    let store = Arc::new(MemoryStore::default());
    store.fail_lookups.store(true, Ordering::SeqCst);
    let c = candidate(Some(Uuid::new_v4()), json!({}));

    let lenient = Differ::new(store.clone(), LookupFailurePolicy::TreatAsAdd);
    assert!(matches!(
      lenient.diff(&c).await.unwrap(),
      DiffOutcome::Changed(d) if d.change_type == ChangeType::Add
    ));

    let strict = Differ::new(store, LookupFailurePolicy::Abort);
    assert!(matches!(strict.diff(&c).await, Err(Error::Lookup { .. })));
  }

  #[test]
  fn nested_paths_and_coarse_arrays() {
    let current = fields(json!({
      "processing_time_range": { "min_days": 30, "max_days": 60 },
      "fees": [{ "label": "Application", "amount": 75 }],
      "notes": ["x"],
      "work_rights": "None",
    }));
    let proposed = fields(json!({
      "processing_time_range": { "min_days": 30, "max_days": 90 },
      "fees": [{ "label": "Application", "amount": 90 }],
      "notes": ["x"],
      "description": null,
    }));

    let diff = diff_fields(&current, &proposed);
    assert_eq!(diff, vec![
      DiffField::new("description", None, Some(Value::Null)),
      DiffField::new(
        "fees",
        Some(json!([{ "label": "Application", "amount": 75 }])),
        Some(json!([{ "label": "Application", "amount": 90 }]))
      ),
      DiffField::new("processing_time_range.max_days", Some(json!(60)), Some(json!(90))),
      DiffField::new("work_rights", Some(json!("None")), None),
    ]);
  }
}
