//! Field-level diffs between the published and the proposed state of an
//! entity.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// How a change affects the entity as a whole.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeType {
  Add,
  Update,
  Remove,
}

/// One changed field, addressed by a dotted path (`processing_time_range.min_days`).
///
/// `from == None` means the field was added; `to == None` means it was
/// removed. A present JSON `null` is `Some(Value::Null)`, which is distinct
/// from absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffField {
  pub field: String,
  #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
  pub from:  Option<Value>,
  #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
  pub to:    Option<Value>,
}

impl DiffField {
  pub fn new(field: impl Into<String>, from: Option<Value>, to: Option<Value>) -> Self {
    Self { field: field.into(), from, to }
  }
}

/// A key that is present deserialises to `Some`, even when its value is null.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
  D: Deserializer<'de>,
{
  Value::deserialize(deserializer).map(Some)
}

/// The differ's output, carried through routing, review and publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffOutput {
  pub change_type:  ChangeType,
  pub diff_summary: String,
  pub diff_fields:  Vec<DiffField>,
  pub source_ids:   Vec<Uuid>,
  /// Version of the published row this diff was computed against. `None` for
  /// new entities, where the publisher must insert rather than overwrite.
  #[serde(default)]
  pub base_version: Option<i64>,
}

impl DiffOutput {
  /// An addition against an existing row: the entity was unpublished and the
  /// change would put it back on the public surface.
  pub fn is_republish(&self) -> bool {
    self.change_type == ChangeType::Add && self.base_version.is_some()
  }

  /// Names of the changed fields, in diff order.
  pub fn field_names(&self) -> impl Iterator<Item = &str> {
    self.diff_fields.iter().map(|d| d.field.as_str())
  }
}
