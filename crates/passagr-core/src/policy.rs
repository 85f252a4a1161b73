//! Editorial policy configuration: the critical-field set and freshness
//! policies.
//!
//! Both are loaded from configuration rather than hard-coded so they can be
//! audited and changed without a deploy. The defaults below are what a fresh
//! installation starts with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::entity::EntityType;

// ─── Critical fields ─────────────────────────────────────────────────────────

/// Fields whose change always forces human review, per entity type.
///
/// Entries are field paths. A diff path matches an entry when it is equal to
/// it or nested below it (`fees` matches `fees.0.amount` but not `fees_note`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriticalFields(BTreeMap<EntityType, Vec<String>>);

impl Default for CriticalFields {
  fn default() -> Self {
    let table: [(EntityType, &[&str]); 3] = [
      (EntityType::Country, &[
        "lgbtq_rights_index",
        "abortion_access_status",
        "hate_crime_law_snapshot",
      ]),
      (EntityType::VisaPath, &[
        "fees",
        "processing_time_range",
        "eligibility",
        "in_country_conversion_path",
      ]),
      (EntityType::Requirement, &["prep_mode"]),
    ];
    Self(
      table
        .into_iter()
        .map(|(ty, fields)| (ty, fields.iter().map(|f| (*f).to_owned()).collect()))
        .collect(),
    )
  }
}

impl CriticalFields {
  pub fn new(table: BTreeMap<EntityType, Vec<String>>) -> Self { Self(table) }

  pub fn fields_for(&self, entity_type: EntityType) -> &[String] {
    self.0.get(&entity_type).map(Vec::as_slice).unwrap_or(&[])
  }

  /// The critical entry matched by `path`, if any.
  pub fn matching(&self, entity_type: EntityType, path: &str) -> Option<&str> {
    self
      .fields_for(entity_type)
      .iter()
      .map(String::as_str)
      .find(|critical| path_within(path, critical))
  }

  /// Replace the entries of every entity type named in `overrides`, keeping
  /// the rest. An explicit empty list clears a type.
  pub fn overlay(mut self, overrides: Self) -> Self {
    self.0.extend(overrides.0);
    self
  }

  /// Entity types critical by default that have no critical field here.
  pub fn uncovered_defaults(&self) -> Vec<EntityType> {
    Self::default()
      .0
      .into_keys()
      .filter(|ty| self.fields_for(*ty).is_empty())
      .collect()
  }

  pub fn iter(&self) -> impl Iterator<Item = (EntityType, &[String])> {
    self.0.iter().map(|(ty, f)| (*ty, f.as_slice()))
  }
}

/// `path` equals `prefix` or continues it after a `.` boundary.
fn path_within(path: &str, prefix: &str) -> bool {
  match path.strip_prefix(prefix) {
    Some(rest) => rest.is_empty() || rest.starts_with('.'),
    None => false,
  }
}

// ─── Freshness ───────────────────────────────────────────────────────────────

/// How urgent a stale value is. Ordered most urgent first.
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
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Criticality {
  Critical,
  High,
  Medium,
  Low,
}

/// How long a published field may go unverified before re-extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
  /// Field name the policy applies to, e.g. `abortion_access_status`.
  pub key:         String,
  pub ttl_days:    u32,
  pub criticality: Criticality,
}

impl FreshnessPolicy {
  pub fn new(key: impl Into<String>, ttl_days: u32, criticality: Criticality) -> Self {
    Self { key: key.into(), ttl_days, criticality }
  }
}

/// The policies a fresh installation is seeded with.
pub fn default_freshness_policies() -> Vec<FreshnessPolicy> {
  vec![
    FreshnessPolicy::new("lgbtq_rights_index", 90, Criticality::High),
    FreshnessPolicy::new("abortion_access_status", 30, Criticality::Critical),
    FreshnessPolicy::new("hate_crime_law_snapshot", 180, Criticality::Medium),
    FreshnessPolicy::new("fees", 90, Criticality::High),
    FreshnessPolicy::new("processing_time_range", 90, Criticality::Medium),
  ]
}
