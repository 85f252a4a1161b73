//! Stage 2: schema, business and safety checks.
//!
//! Validation never fails. A broken candidate produces a
//! [`ValidationResult`] with `valid == false` and `impact == High`, and the
//! router takes it from there.

use passagr_core::{
  entity::{CandidateEntity, EntityType, Fields},
  validation::{Impact, ValidationResult},
};
use serde_json::Value;

use crate::schema::{self, FieldSpec, Kind};

/// Collects findings while ratcheting impact upward.
#[derive(Default)]
struct Findings {
  errors:   Vec<String>,
  warnings: Vec<String>,
  impact:   Impact,
}

impl Findings {
  fn error(&mut self, message: impl Into<String>) {
    self.errors.push(message.into());
    self.impact = self.impact.raise(Impact::High);
  }

  fn warn(&mut self, message: impl Into<String>, floor: Option<Impact>) {
    self.warnings.push(message.into());
    if let Some(floor) = floor {
      self.impact = self.impact.raise(floor);
    }
  }

  fn finish(self) -> ValidationResult {
    let tier = if !self.errors.is_empty() {
      Impact::High
    } else if !self.warnings.is_empty() {
      Impact::Medium
    } else {
      Impact::Low
    };
    ValidationResult {
      valid:    self.errors.is_empty(),
      impact:   self.impact.raise(tier),
      errors:   self.errors,
      warnings: self.warnings,
    }
  }
}

/// Deterministic: the same candidate always yields the same result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
  pub fn validate(&self, candidate: &CandidateEntity) -> ValidationResult {
    let mut findings = Findings::default();

    check_record(
      schema::fields_for(candidate.entity_type),
      &candidate.fields,
      "",
      &mut findings,
    );

    if candidate.entity_type == EntityType::VisaPath {
      check_processing_range(&candidate.fields, &mut findings);
    }
    if candidate.entity_type == EntityType::Country {
      check_country_safety(&candidate.fields, &mut findings);
    }

    scan_completeness(&candidate.fields, "", &mut findings);

    findings.finish()
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

fn join(prefix: &str, key: &str) -> String {
  if prefix.is_empty() { key.to_owned() } else { format!("{prefix}.{key}") }
}

fn check_record(
  specs: &[FieldSpec],
  object: &serde_json::Map<String, Value>,
  prefix: &str,
  findings: &mut Findings,
) {
  for spec in specs {
    let path = join(prefix, spec.name);
    match object.get(spec.name) {
      None if spec.required => findings.error(format!("Missing required field: {path}")),
      None => {}
      Some(Value::Null) if !spec.required => {}
      Some(value) => check_value(&spec.kind, value, &path, findings),
    }
  }
}

fn check_value(kind: &Kind, value: &Value, path: &str, findings: &mut Findings) {
  match kind {
    Kind::List(item) => match value.as_array() {
      Some(items) => {
        for (i, v) in items.iter().enumerate() {
          check_value(item, v, &join(path, &i.to_string()), findings);
        }
      }
      None => findings.error(format!("Validation error: must be array at {path}")),
    },
    Kind::Record(specs) => match value.as_object() {
      Some(object) => check_record(specs, object, path, findings),
      None => findings.error(format!("Validation error: must be object at {path}")),
    },
    scalar => {
      if let Some(msg) = scalar_problem(scalar, value) {
        findings.error(format!("Validation error: {msg} at {path}"));
      }
    }
  }
}

/// What is wrong with a non-container value, if anything.
fn scalar_problem(kind: &Kind, value: &Value) -> Option<String> {
  match kind {
    Kind::Text { min, max } => {
      let Some(s) = value.as_str() else { return Some("must be string".to_owned()) };
      let len = s.chars().count();
      if len < *min {
        return Some(format!("must NOT have fewer than {min} characters"));
      }
      match max {
        Some(max) if len > *max => Some(format!("must NOT have more than {max} characters")),
        _ => None,
      }
    }
    Kind::NullableText if !(value.is_string() || value.is_null()) => {
      Some("must be string,null".to_owned())
    }
    Kind::Integer { min, max } => match value.as_i64() {
      None => Some("must be integer".to_owned()),
      Some(n) if n < *min => Some(format!("must be >= {min}")),
      Some(n) if n > *max => Some(format!("must be <= {max}")),
      Some(_) => None,
    },
    Kind::NullableNumber if !(value.is_number() || value.is_null()) => {
      Some("must be number,null".to_owned())
    }
    Kind::Boolean if !value.is_boolean() => Some("must be boolean".to_owned()),
    Kind::OneOf(options) if !value.as_str().is_some_and(|s| options.iter().any(|o| *o == s)) => {
      Some("must be equal to one of the allowed values".to_owned())
    }
    _ => None,
  }
}

// ─── Business rules ──────────────────────────────────────────────────────────

fn check_processing_range(fields: &Fields, findings: &mut Findings) {
  let Some(range) = fields.get("processing_time_range") else { return };
  let min = range.get("min_days").and_then(Value::as_f64);
  let max = range.get("max_days").and_then(Value::as_f64);
  if let (Some(min), Some(max)) = (min, max)
    && min > max
  {
    findings.error("`min_days` cannot be greater than `max_days`.");
  }
}

fn check_country_safety(fields: &Fields, findings: &mut Findings) {
  match fields.get("lgbtq_rights_index") {
    None | Some(Value::Null) => {
      findings.error("CRITICAL: `lgbtq_rights_index` is required for country entities.")
    }
    Some(v) if !v.as_i64().is_some_and(|n| (0..=5).contains(&n)) => {
      findings.error("CRITICAL: `lgbtq_rights_index` must be an integer between 0 and 5.")
    }
    Some(_) => {}
  }

  let abortion = fields
    .get("abortion_access_status")
    .and_then(Value::as_str)
    .filter(|s| !s.trim().is_empty());
  if abortion.is_none() {
    findings.error("CRITICAL: `abortion_access_status` is required for country entities.");
  }

  let hate_crime = fields
    .get("hate_crime_law_snapshot")
    .and_then(Value::as_str)
    .filter(|s| !s.trim().is_empty());
  if hate_crime.is_none() {
    findings.warn(
      "WARNING: `hate_crime_law_snapshot` is missing. This field provides important safety \
       context.",
      Some(Impact::Medium),
    );
  }
}

// ─── Completeness ────────────────────────────────────────────────────────────

fn is_blank(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.is_empty(),
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
    Value::Bool(_) | Value::Number(_) => false,
  }
}

fn scan_completeness(fields: &Fields, prefix: &str, findings: &mut Findings) {
  for (key, value) in fields {
    scan_value(value, &join(prefix, key), findings);
  }
}

fn scan_value(value: &Value, path: &str, findings: &mut Findings) {
  if is_blank(value) {
    findings.warn(format!("Field '{path}' is null or empty."), None);
    return;
  }
  match value {
    Value::Object(o) => scan_completeness(o, path, findings),
    Value::Array(items) => {
      for (i, item) in items.iter().enumerate() {
        scan_value(item, &join(path, &i.to_string()), findings);
      }
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use serde_json::json;
  use uuid::Uuid;

  use super::*;

  fn candidate(entity_type: EntityType, fields: Value) -> CandidateEntity {
    CandidateEntity {
      entity_type,
      entity_id: None,
      source_id: Uuid::nil(),
      last_verified_at: Utc::now(),
      fields: fields.as_object().cloned().unwrap_or_default(),
    }
  }

  fn complete_country() -> Value {
    json!({
      "name": "Portugal",
      "iso2": "PT",
      "currency": "EUR",
      "lgbtq_rights_index": 4,
      "abortion_access_status": "Legal on request up to 10 weeks",
      "hate_crime_law_snapshot": "Sexual orientation and gender identity covered",
    })
  }

  #[test]
  fn complete_country_is_low_impact() {
    let result = Validator.validate(&candidate(EntityType::Country, complete_country()));
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert_eq!(result.impact, Impact::Low);
  }

  #[test]
  fn country_without_abortion_status_is_invalid_and_high() {
    let mut fields = complete_country();
    fields.as_object_mut().unwrap().remove("abortion_access_status");

    let result = Validator.validate(&candidate(EntityType::Country, fields));
    assert!(!result.valid);
    assert_eq!(result.impact, Impact::High);
    assert!(result.errors.contains(
      &"CRITICAL: `abortion_access_status` is required for country entities.".to_owned()
    ));
  }

  #[test]
  fn blank_abortion_status_counts_as_missing() {
    let mut fields = complete_country();
    fields["abortion_access_status"] = json!("  ");
    let result = Validator.validate(&candidate(EntityType::Country, fields));
    assert!(!result.valid);
  }

  #[test]
  fn lgbtq_index_out_of_range() {
    let mut fields = complete_country();
    fields["lgbtq_rights_index"] = json!(7);
    let result = Validator.validate(&candidate(EntityType::Country, fields));
    assert_eq!(result.errors, vec![
      "CRITICAL: `lgbtq_rights_index` must be an integer between 0 and 5.".to_owned()
    ]);
    assert_eq!(result.impact, Impact::High);
  }

  #[test]
  fn missing_hate_crime_snapshot_is_a_medium_warning() {
    let mut fields = complete_country();
    fields.as_object_mut().unwrap().remove("hate_crime_law_snapshot");
    let result = Validator.validate(&candidate(EntityType::Country, fields));
    assert!(result.valid);
    assert_eq!(result.impact, Impact::Medium);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("WARNING: `hate_crime_law_snapshot`"));
  }

  #[test]
  fn schema_errors_carry_paths() {
    let result = Validator.validate(&candidate(
      EntityType::VisaPath,
      json!({
        "name": "Digital Nomad Visa",
        "type": "tourism",
        "fees": [{ "label": "Application", "amount": "ninety", "currency": "EURO" }],
      }),
    ));
    assert!(!result.valid);
    assert_eq!(result.errors, vec![
      "Missing required field: country_id".to_owned(),
      "Validation error: must be equal to one of the allowed values at type".to_owned(),
      "Validation error: must be number,null at fees.0.amount".to_owned(),
      "Validation error: must NOT have more than 3 characters at fees.0.currency".to_owned(),
    ]);
  }

  #[test]
  fn min_days_above_max_days_is_an_error() {
    let result = Validator.validate(&candidate(
      EntityType::VisaPath,
      json!({
        "country_id": "pt",
        "name": "Digital Nomad Visa",
        "type": "digital_nomad",
        "processing_time_range": { "min_days": 90, "max_days": 60 },
      }),
    ));
    assert_eq!(result.errors, vec![
      "`min_days` cannot be greater than `max_days`.".to_owned()
    ]);
    assert_eq!(result.impact, Impact::High);
  }

  #[test]
  fn completeness_scan_walks_nested_values() {
    let result = Validator.validate(&candidate(
      EntityType::VisaPath,
      json!({
        "country_id": "pt",
        "name": "Digital Nomad Visa",
        "type": "digital_nomad",
        "description": "",
        "processing_time_range": { "min_days": null, "max_days": 60 },
        "notes": ["ok", ""],
      }),
    ));
    assert!(result.valid);
    assert_eq!(result.impact, Impact::Medium);
    assert_eq!(result.warnings, vec![
      "Field 'description' is null or empty.".to_owned(),
      "Field 'notes.1' is null or empty.".to_owned(),
      "Field 'processing_time_range.min_days' is null or empty.".to_owned(),
    ]);
  }

  #[test]
  fn requirement_prep_mode_is_checked() {
    let result = Validator.validate(&candidate(
      EntityType::Requirement,
      json!({ "visapath_id": "v", "label": "Passport", "prep_mode": "by_pigeon" }),
    ));
    assert!(!result.valid);
  }

  #[test]
  fn validation_is_deterministic() {
    let c = candidate(EntityType::Country, json!({ "name": "X" }));
    assert_eq!(Validator.validate(&c), Validator.validate(&c));
  }
}
