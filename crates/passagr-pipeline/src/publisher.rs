//! Stage 5: make a change canonical.
//!
//! A publish is a version-checked entity write, then the downstream signals,
//! then one changelog entry. The entity write is the commit point: signals go
//! out as soon as the row is live, and if the changelog append still fails
//! after retrying, the publish is reported as [`Error::Unaudited`] with the
//! entry attached for reconciliation.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use passagr_core::{
  changelog::{Attribution, ChangelogEntry, NewChangelogEntry},
  diff::{ChangeType, DiffOutput},
  entity::{CandidateEntity, EntityStatus, EntityType, EntityWrite, PublishedEntity},
  store::{ClassifyError, PipelineStore, StoreErrorKind},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  signals::{Signal, Signals},
};

/// The result of a successful publish.
#[derive(Debug, Clone, Serialize)]
pub struct Publication {
  pub entity:    PublishedEntity,
  pub changelog: ChangelogEntry,
}

pub struct Publisher<S> {
  store:             Arc<S>,
  signals:           Signals,
  changelog_retries: u32,
  retry_backoff:     Duration,
}

impl<S: PipelineStore> Publisher<S> {
  pub fn new(store: Arc<S>, signals: Signals) -> Self {
    Self { store, signals, changelog_retries: 3, retry_backoff: Duration::from_millis(100) }
  }

  /// How many times a failed changelog append is retried, and the initial
  /// delay between attempts (doubled after each failure).
  pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
    self.changelog_retries = retries;
    self.retry_backoff = backoff;
    self
  }

  /// Publish `candidate` as described by `diff`.
  ///
  /// The write is conditioned on `diff.base_version`: new entities insert
  /// only, updates and republications require the version the diff was
  /// computed against. A mismatch is [`Error::Conflict`] and nothing is
  /// written.
  pub async fn publish(
    &self,
    candidate: &CandidateEntity,
    diff: &DiffOutput,
    attribution: &Attribution,
  ) -> Result<Publication> {
    let entity_id = candidate.entity_id.unwrap_or_else(Uuid::new_v4);

    let entity = self
      .write(
        EntityWrite {
          entity_id,
          entity_type: candidate.entity_type,
          fields: candidate.fields.clone(),
          status: EntityStatus::Published,
          last_verified_at: Utc::now(),
        },
        diff.base_version,
      )
      .await?;
    self.announce(entity.entity_type, entity_id);

    let entry = NewChangelogEntry {
      entity_type:  entity.entity_type,
      entity_id,
      change_type:  diff.change_type,
      diff_summary: diff.diff_summary.clone(),
      diff_fields:  diff.diff_fields.clone(),
      snapshot:     entity.fields.clone(),
      created_by:   attribution.marker(),
      source_ids:   diff.source_ids.clone(),
    };
    let changelog = self.append_changelog(entry).await?;

    info!(
      %entity_id,
      entity_type = %entity.entity_type,
      version = entity.version,
      change_type = %diff.change_type,
      created_by = %changelog.created_by,
      "published"
    );

    Ok(Publication { entity, changelog })
  }

  /// Withdraw an entity from the public surface. Its fields are kept; the
  /// changelog records a `remove`.
  pub async fn unpublish(&self, entity_id: Uuid, attribution: &Attribution) -> Result<Publication> {
    let current = self
      .store
      .get_entity(entity_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::EntityNotFound(entity_id))?;
    if current.status == EntityStatus::Unpublished {
      return Err(Error::AlreadyUnpublished(entity_id));
    }

    let entity = self
      .write(
        EntityWrite {
          entity_id,
          entity_type: current.entity_type,
          fields: current.fields,
          status: EntityStatus::Unpublished,
          last_verified_at: current.last_verified_at,
        },
        Some(current.version),
      )
      .await?;
    self.announce(entity.entity_type, entity_id);

    let changelog = self
      .append_changelog(NewChangelogEntry {
        entity_type:  entity.entity_type,
        entity_id,
        change_type:  ChangeType::Remove,
        diff_summary: format!("{} unpublished.", entity.entity_type),
        diff_fields:  vec![],
        snapshot:     entity.fields.clone(),
        created_by:   attribution.marker(),
        source_ids:   vec![],
      })
      .await?;

    info!(%entity_id, entity_type = %entity.entity_type, "unpublished");

    Ok(Publication { entity, changelog })
  }

  /// Append a changelog entry, retrying with exponential backoff.
  ///
  /// Also the reconciliation path for an [`Error::Unaudited`] publish: pass
  /// the carried entry back in.
  pub async fn append_changelog(&self, entry: NewChangelogEntry) -> Result<ChangelogEntry> {
    let mut delay = self.retry_backoff;
    let mut attempt = 0;
    loop {
      match self.store.append_changelog(entry.clone()).await {
        Ok(stored) => return Ok(stored),
        Err(e) if attempt < self.changelog_retries => {
          attempt += 1;
          warn!(
            entity_id = %entry.entity_id,
            attempt,
            error = %e,
            "changelog append failed; retrying"
          );
          tokio::time::sleep(delay).await;
          delay = delay.saturating_mul(2);
        }
        Err(e) => {
          warn!(
            entity_id = %entry.entity_id,
            error = %e,
            "changelog append failed; publish is unaudited"
          );
          return Err(Error::Unaudited {
            entity_id: entry.entity_id,
            entry:     Box::new(entry),
            source:    Box::new(e),
          });
        }
      }
    }
  }

  async fn write(&self, write: EntityWrite, expected: Option<i64>) -> Result<PublishedEntity> {
    let entity_id = write.entity_id;
    self
      .store
      .upsert_entity(write, expected)
      .await
      .map_err(|e| match e.kind() {
        StoreErrorKind::Conflict => {
          warn!(%entity_id, ?expected, "entity moved on since the diff; not publishing");
          Error::Conflict { entity_id, source: Box::new(e) }
        }
        _ => Error::store(e),
      })
  }

  fn announce(&self, entity_type: EntityType, entity_id: Uuid) {
    self.signals.emit(Signal::SearchSync { entity_type, entity_id });
    self.signals.emit(Signal::CachePurge { path: entity_type.public_path(entity_id) });
  }
}
