//! Finds published entities whose safety-relevant fields have gone unverified
//! for longer than their freshness policy allows, and plans re-extraction.

use chrono::{DateTime, Utc};
use passagr_core::{
  entity::{EntityStatus, EntityType, PublishedEntity},
  policy::{Criticality, FreshnessPolicy},
  store::PipelineStore,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Error, Result, extractor::ExtractionTask, schema};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleEntity {
  pub entity_id:           Uuid,
  pub entity_type:         EntityType,
  pub name:                Option<String>,
  /// Key of the most critical policy the entity violates.
  pub policy:              String,
  pub criticality:         Criticality,
  pub ttl_days:            u32,
  pub days_since_verified: i64,
  pub days_overdue:        i64,
  pub last_verified_at:    DateTime<Utc>,
}

/// Every published entity that violates at least one applicable policy, most
/// urgent first.
pub async fn scan<S: PipelineStore>(store: &S, now: DateTime<Utc>) -> Result<Vec<StaleEntity>> {
  let policies = store.list_freshness_policies().await.map_err(Error::store)?;
  let entities = store
    .list_entities(None, Some(EntityStatus::Published))
    .await
    .map_err(Error::store)?;

  let mut stale: Vec<StaleEntity> =
    entities.iter().filter_map(|e| assess(e, &policies, now)).collect();
  stale.sort_by(|a, b| {
    a.criticality
      .cmp(&b.criticality)
      .then(b.days_overdue.cmp(&a.days_overdue))
  });

  info!(checked = entities.len(), stale = stale.len(), "freshness scan complete");
  Ok(stale)
}

fn assess(
  entity: &PublishedEntity,
  policies: &[FreshnessPolicy],
  now: DateTime<Utc>,
) -> Option<StaleEntity> {
  let days = (now - entity.last_verified_at).num_days();
  let worst = policies
    .iter()
    .filter(|p| schema::has_field(entity.entity_type, &p.key))
    .filter(|p| days > i64::from(p.ttl_days))
    .min_by_key(|p| (p.criticality, p.ttl_days))?;

  Some(StaleEntity {
    entity_id:           entity.entity_id,
    entity_type:         entity.entity_type,
    name:                ["name", "label", "title"]
      .iter()
      .find_map(|k| entity.fields.get(*k).and_then(Value::as_str))
      .map(str::to_owned),
    policy:              worst.key.clone(),
    criticality:         worst.criticality,
    ttl_days:            worst.ttl_days,
    days_since_verified: days,
    days_overdue:        days - i64::from(worst.ttl_days),
    last_verified_at:    entity.last_verified_at,
  })
}

/// Turn stale entities into refresh tasks against their latest source.
///
/// Entities with no recorded source are skipped with a warning.
pub async fn plan_refresh<S: PipelineStore>(
  store: &S,
  stale: &[StaleEntity],
) -> Result<Vec<ExtractionTask>> {
  let mut tasks = Vec::with_capacity(stale.len());
  for entity in stale {
    let log = store.changelog_for(entity.entity_id).await.map_err(Error::store)?;
    let latest = log.iter().rev().find_map(|e| e.source_ids.last().copied());
    match latest {
      Some(source_id) => tasks.push(ExtractionTask {
        source_id,
        entity_type: entity.entity_type,
        entity_id: Some(entity.entity_id),
      }),
      None => warn!(entity_id = %entity.entity_id, "stale entity has no source to refresh from"),
    }
  }
  Ok(tasks)
}
