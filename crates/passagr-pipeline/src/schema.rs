//! Field schemas per entity type.
//!
//! One table drives three things: the skeleton shown to the extraction model,
//! the shape extractor output is conformed to, and the validator's schema
//! check.

use passagr_core::entity::{EntityType, Fields};
use serde_json::{Map, Value};

/// The accepted shape of a field value.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
  /// A string whose length in characters lies in `min..=max`.
  Text { min: usize, max: Option<usize> },
  /// A string or null.
  NullableText,
  /// An integer in `min..=max`.
  Integer { min: i64, max: i64 },
  /// A number or null.
  NullableNumber,
  Boolean,
  /// One of a closed set of strings.
  OneOf(&'static [&'static str]),
  /// An array whose items all have the given kind.
  List(&'static Kind),
  /// An object with the given fields. Unlisted keys are allowed.
  Record(&'static [FieldSpec]),
  /// Any JSON value, unchecked.
  Any,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
  pub name:     &'static str,
  pub kind:     Kind,
  pub required: bool,
}

const fn req(name: &'static str, kind: Kind) -> FieldSpec {
  FieldSpec { name, kind, required: true }
}

const fn opt(name: &'static str, kind: Kind) -> FieldSpec {
  FieldSpec { name, kind, required: false }
}

const NON_EMPTY: Kind = Kind::Text { min: 1, max: None };
const ANY_TEXT: Kind = Kind::Text { min: 0, max: None };
const CURRENCY: Kind = Kind::Text { min: 3, max: Some(3) };
const TEXT_LIST: Kind = Kind::List(&Kind::NullableText);
const ANY_LIST: Kind = Kind::List(&Kind::Any);

pub const VISA_TYPES: &[&str] = &[
  "work",
  "study",
  "family",
  "retirement",
  "entrepreneur",
  "investor",
  "digital_nomad",
  "special",
];

pub const PREP_MODES: &[&str] = &["remote_only", "in_person", "on_arrival"];

const MONEY: &[FieldSpec] = &[
  opt("amount", Kind::NullableNumber),
  opt("currency", Kind::NullableText),
];

const FEE: &[FieldSpec] = &[
  req("label", ANY_TEXT),
  req("amount", Kind::NullableNumber),
  req("currency", CURRENCY),
];

const DAY_RANGE: &[FieldSpec] = &[
  opt("min_days", Kind::NullableNumber),
  opt("max_days", Kind::NullableNumber),
];

// The safety fields are `Any` here: the validator's country safety rules own
// their presence and range checks.
const COUNTRY: &[FieldSpec] = &[
  req("name", NON_EMPTY),
  req("iso2", Kind::Text { min: 2, max: Some(2) }),
  opt("regions", TEXT_LIST),
  opt("languages", TEXT_LIST),
  opt("currency", CURRENCY),
  opt("timezones", TEXT_LIST),
  opt("climate_tags", TEXT_LIST),
  opt("healthcare_overview", Kind::NullableText),
  opt("rights_snapshot", Kind::NullableText),
  opt("tax_snapshot", Kind::NullableText),
  opt("lgbtq_rights_index", Kind::Any),
  opt("abortion_access_status", Kind::Any),
  opt("hate_crime_law_snapshot", Kind::NullableText),
  opt("notes", ANY_LIST),
  opt("section_confidence", Kind::Any),
  opt("sources", ANY_LIST),
];

const VISA_PATH: &[FieldSpec] = &[
  req("country_id", ANY_TEXT),
  req("name", NON_EMPTY),
  req("type", Kind::OneOf(VISA_TYPES)),
  opt("description", Kind::NullableText),
  opt("eligibility", TEXT_LIST),
  opt("work_rights", Kind::NullableText),
  opt("dependents_rules", Kind::NullableText),
  opt("min_income", Kind::Record(MONEY)),
  opt("min_savings", Kind::Record(MONEY)),
  opt("fees", Kind::List(&Kind::Record(FEE))),
  opt("processing_time_range", Kind::Record(DAY_RANGE)),
  opt("renewal_rules", Kind::NullableText),
  opt("to_pr_citizenship_timeline", Kind::NullableText),
  opt("in_country_conversion_path", Kind::NullableText),
  opt("sources", ANY_LIST),
  opt("notes", ANY_LIST),
];

const REQUIREMENT: &[FieldSpec] = &[
  req("visapath_id", ANY_TEXT),
  req("label", NON_EMPTY),
  opt("details", Kind::NullableText),
  opt("doc_list", TEXT_LIST),
  opt("notarization_needed", Kind::Boolean),
  opt("apostille_needed", Kind::Boolean),
  req("prep_mode", Kind::OneOf(PREP_MODES)),
];

const STEP: &[FieldSpec] = &[
  req("visapath_id", ANY_TEXT),
  req("order_int", Kind::Integer { min: 0, max: i64::MAX }),
  req("title", NON_EMPTY),
  opt("description", Kind::NullableText),
];

/// The field table for an entity type.
pub fn fields_for(entity_type: EntityType) -> &'static [FieldSpec] {
  match entity_type {
    EntityType::Country => COUNTRY,
    EntityType::VisaPath => VISA_PATH,
    EntityType::Requirement => REQUIREMENT,
    EntityType::Step => STEP,
  }
}

pub fn has_field(entity_type: EntityType, name: &str) -> bool {
  fields_for(entity_type).iter().any(|f| f.name == name)
}

// ─── Skeleton ────────────────────────────────────────────────────────────────

/// The JSON template the extraction model fills in.
///
/// Placeholders are hints only: `""` for text, `"a|b|c"` for closed sets,
/// `null` for numbers and booleans, one sample item for lists of records.
pub fn skeleton(entity_type: EntityType) -> Value {
  Value::Object(record_skeleton(fields_for(entity_type)))
}

fn record_skeleton(specs: &[FieldSpec]) -> Map<String, Value> {
  specs
    .iter()
    .map(|spec| (spec.name.to_owned(), placeholder(&spec.kind)))
    .collect()
}

fn placeholder(kind: &Kind) -> Value {
  match kind {
    Kind::Text { .. } | Kind::NullableText => Value::String(String::new()),
    Kind::OneOf(options) => Value::String(options.join("|")),
    Kind::List(Kind::Record(specs)) => Value::Array(vec![Value::Object(record_skeleton(specs))]),
    Kind::List(_) => Value::Array(vec![]),
    Kind::Record(specs) => Value::Object(record_skeleton(specs)),
    Kind::Integer { .. } | Kind::NullableNumber | Kind::Boolean | Kind::Any => Value::Null,
  }
}

// ─── Conforming ──────────────────────────────────────────────────────────────

/// Reshape raw model output to the schema for `entity_type`.
///
/// Unknown keys are dropped. A key the model left out becomes `null`, `[]`,
/// or an object conformed from nothing; it is never filled from the
/// skeleton's placeholder text. Values that are present are kept as they are
/// so the validator sees what the model actually said.
pub fn conform(entity_type: EntityType, raw: &Fields) -> Fields {
  conform_record(fields_for(entity_type), Some(raw))
}

fn conform_record(specs: &[FieldSpec], raw: Option<&Map<String, Value>>) -> Fields {
  specs
    .iter()
    .map(|spec| {
      let value = raw.and_then(|r| r.get(spec.name));
      (spec.name.to_owned(), conform_value(&spec.kind, value))
    })
    .collect()
}

fn conform_value(kind: &Kind, value: Option<&Value>) -> Value {
  match (kind, value) {
    (Kind::Record(specs), Some(Value::Object(obj))) => {
      Value::Object(conform_record(specs, Some(obj)))
    }
    (Kind::Record(specs), None) => Value::Object(conform_record(specs, None)),
    (Kind::List(Kind::Record(specs)), Some(Value::Array(items))) => Value::Array(
      items
        .iter()
        .map(|item| match item {
          Value::Object(obj) => Value::Object(conform_record(specs, Some(obj))),
          other => other.clone(),
        })
        .collect(),
    ),
    (Kind::List(_), None) => Value::Array(vec![]),
    (_, Some(v)) => v.clone(),
    (_, None) => Value::Null,
  }
}
