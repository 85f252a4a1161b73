//! Stage 6: human-readable alert text for notable publishes.

use passagr_core::{
  changelog::Attribution,
  diff::DiffOutput,
  entity::CandidateEntity,
  validation::Impact,
};
use serde::{Deserialize, Serialize};

/// Upper bound, in characters, of each alert text.
pub const MAX_ALERT_CHARS: usize = 200;

/// How many changed field names the email summary mentions.
const FIELDS_MENTIONED: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
  pub notification:  String,
  pub email_summary: String,
}

impl Alert {
  /// Compose alert text, or `None` for low-impact changes.
  ///
  /// Pure: composing an alert never affects the publish it describes.
  pub fn compose(
    candidate: &CandidateEntity,
    diff: &DiffOutput,
    impact: Impact,
    attribution: &Attribution,
  ) -> Option<Self> {
    if impact == Impact::Low {
      return None;
    }

    let name = candidate.display_name();
    let entity_type = candidate.entity_type;

    let notification = format!(
      "A change has been published for {name} {entity_type}: {}",
      diff.diff_summary
    );

    let approval = match attribution {
      Attribution::Automated => "have been automatically approved",
      Attribution::Reviewer(_) => "have been approved by an editor",
    };
    let fields: Vec<&str> = diff.field_names().take(FIELDS_MENTIONED).collect();
    let email_summary = if fields.is_empty() {
      format!(
        "A new update for the {name} {entity_type} has been published. The changes {approval}."
      )
    } else {
      format!(
        "A new update for the {name} {entity_type} has been published. The changes affect key \
         fields like {} and {approval}.",
        fields.join(", ")
      )
    };

    Some(Self {
      notification:  truncate(&notification, MAX_ALERT_CHARS),
      email_summary: truncate(&email_summary, MAX_ALERT_CHARS),
    })
  }
}

/// Shorten `text` to at most `max` characters, cutting at a word boundary and
/// ending with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
  if text.chars().count() <= max {
    return text.to_owned();
  }
  let budget = max.saturating_sub(1);
  let cut: String = text.chars().take(budget).collect();
  let head = match cut.rfind(char::is_whitespace) {
    Some(i) if i > 0 => &cut[..i],
    _ => cut.as_str(),
  };
  format!("{}…", head.trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == ':'))
}
