//! Validation verdicts.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Risk tier of a candidate. Ordered: `Low < Medium < High`.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
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
pub enum Impact {
  #[default]
  Low,
  Medium,
  High,
}

impl Impact {
  /// Ratchet upward: never returns something lower than `self`.
  pub fn raise(self, to: Impact) -> Impact { self.max(to) }
}

/// The outcome of validating one candidate. Always produced, even when the
/// candidate is badly broken; an invalid candidate simply carries
/// `impact == High`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
  pub valid:    bool,
  pub errors:   Vec<String>,
  pub warnings: Vec<String>,
  pub impact:   Impact,
}

impl ValidationResult {
  /// A clean verdict with the given impact; mostly useful in tests and for
  /// callers that bypass validation.
  pub fn with_impact(impact: Impact) -> Self {
    Self { valid: true, impact, ..Default::default() }
  }
}
