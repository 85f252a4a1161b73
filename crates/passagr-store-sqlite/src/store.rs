//! [`SqliteStore`], the SQLite implementation of [`PipelineStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use passagr_core::{
  changelog::{ChangelogEntry, NewChangelogEntry},
  entity::{EntityStatus, EntityType, EntityWrite, PublishedEntity},
  policy::FreshnessPolicy,
  review::{EditorialReview, NewReview, Resolution, ReviewStatus},
  source::{DEFAULT_RELIABILITY, MAX_RELIABILITY, NewSource, SourceDocument},
  store::PipelineStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    CHANGELOG_COLUMNS, ENTITY_COLUMNS, REVIEW_COLUMNS, RawChangelog, RawEntity,
    RawPolicy, RawReview, RawSource, SOURCE_COLUMNS, encode_diff_fields, encode_dt,
    encode_fields, encode_ids, encode_uuid,
  },
  schema::SCHEMA,
};

/// What a version-checked write found, decided inside the connection thread.
enum Upsert {
  Written(RawEntity),
  Conflict(Option<i64>),
  TypeChanged(String),
}

/// What a conditional review resolution found.
enum Resolve {
  Resolved(RawReview),
  Missing,
  AlreadyResolved,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A passagr pipeline store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Seed freshness policies that are not stored yet. Existing rows win, so
  /// operator edits survive restarts.
  pub async fn seed_freshness_policies(&self, policies: &[FreshnessPolicy]) -> Result<usize> {
    let rows: Vec<(String, i64, String)> = policies
      .iter()
      .map(|p| (p.key.clone(), i64::from(p.ttl_days), p.criticality.to_string()))
      .collect();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO freshness_policies (key, ttl_days, criticality)
             VALUES (?1, ?2, ?3)",
          )?;
          for (key, ttl, criticality) in &rows {
            inserted += stmt.execute(rusqlite::params![key, ttl, criticality])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }
}

// ─── PipelineStore impl ──────────────────────────────────────────────────────

impl PipelineStore for SqliteStore {
  type Error = Error;

  // ── Sources ───────────────────────────────────────────────────────────────

  async fn upsert_source(&self, input: NewSource) -> Result<SourceDocument> {
    let id_str = encode_uuid(Uuid::new_v4());
    let at_str = encode_dt(Utc::now());

    let raw: RawSource = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sources (
             source_id, url, title, publisher, content_type, excerpt,
             fetched_at, reliability_score
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT(url) DO UPDATE SET
             title        = excluded.title,
             publisher    = excluded.publisher,
             content_type = excluded.content_type,
             excerpt      = excluded.excerpt,
             fetched_at   = excluded.fetched_at",
          rusqlite::params![
            id_str,
            input.url,
            input.title,
            input.publisher,
            input.content_type,
            input.excerpt,
            at_str,
            i64::from(DEFAULT_RELIABILITY),
          ],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE url = ?1"),
          rusqlite::params![input.url],
          RawSource::from_row,
        )?)
      })
      .await?;

    raw.into_source()
  }

  async fn get_source(&self, id: Uuid) -> Result<Option<SourceDocument>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSource> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE source_id = ?1"),
            rusqlite::params![id_str],
            RawSource::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSource::into_source).transpose()
  }

  async fn sources_due_for_check(&self, limit: usize) -> Result<Vec<SourceDocument>> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawSource> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SOURCE_COLUMNS} FROM sources
           ORDER BY last_checked_at IS NOT NULL, last_checked_at, rowid
           LIMIT ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], RawSource::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSource::into_source).collect()
  }

  async fn record_source_check(
    &self,
    id: Uuid,
    reliability_score: u8,
    checked_at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(checked_at);
    let score = i64::from(reliability_score.min(MAX_RELIABILITY));

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE sources SET reliability_score = ?2, last_checked_at = ?3
           WHERE source_id = ?1",
          rusqlite::params![id_str, score, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::SourceNotFound(id));
    }
    Ok(())
  }

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn get_entity(&self, id: Uuid) -> Result<Option<PublishedEntity>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ?1"),
            rusqlite::params![id_str],
            RawEntity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn list_entities(
    &self,
    entity_type: Option<EntityType>,
    status: Option<EntityStatus>,
  ) -> Result<Vec<PublishedEntity>> {
    let type_str = entity_type.map(|t| t.to_string());
    let status_str = status.map(|s| s.to_string());

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENTITY_COLUMNS} FROM entities
           WHERE (?1 IS NULL OR entity_type = ?1)
             AND (?2 IS NULL OR status = ?2)
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![type_str.as_deref(), status_str.as_deref()],
            RawEntity::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  async fn upsert_entity(
    &self,
    write: EntityWrite,
    expected_version: Option<i64>,
  ) -> Result<PublishedEntity> {
    let entity_id = write.entity_id;
    let write_type = write.entity_type;
    let id_str = encode_uuid(write.entity_id);
    let type_str = write.entity_type.to_string();
    let fields_str = encode_fields(&write.fields)?;
    let status_str = write.status.to_string();
    let verified_str = encode_dt(write.last_verified_at);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let stored: Option<(i64, String)> = tx
          .query_row(
            "SELECT version, entity_type FROM entities WHERE entity_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let current = stored.as_ref().map(|(version, _)| *version);

        if current != expected_version {
          return Ok(Upsert::Conflict(current));
        }
        if let Some((_, stored_type)) = stored.filter(|(_, t)| *t != type_str) {
          return Ok(Upsert::TypeChanged(stored_type));
        }

        match current {
          None => {
            tx.execute(
              "INSERT INTO entities (
                 entity_id, entity_type, fields_json, status, version,
                 last_verified_at, created_at, updated_at
               ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6)",
              rusqlite::params![id_str, type_str, fields_str, status_str, verified_str, now_str],
            )?;
          }
          Some(version) => {
            tx.execute(
              "UPDATE entities SET
                 fields_json = ?2, status = ?3,
                 version = version + 1, last_verified_at = ?4, updated_at = ?5
               WHERE entity_id = ?1 AND version = ?6",
              rusqlite::params![
                id_str,
                fields_str,
                status_str,
                verified_str,
                now_str,
                version,
              ],
            )?;
          }
        }

        let raw = tx.query_row(
          &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ?1"),
          rusqlite::params![id_str],
          RawEntity::from_row,
        )?;
        tx.commit()?;
        Ok(Upsert::Written(raw))
      })
      .await?;

    match outcome {
      Upsert::Written(raw) => raw.into_entity(),
      Upsert::Conflict(found) => Err(Error::VersionConflict {
        entity_id,
        expected: expected_version,
        found,
      }),
      Upsert::TypeChanged(stored) => Err(Error::EntityTypeChanged {
        entity_id,
        stored,
        proposed: write_type.to_string(),
      }),
    }
  }

  // ── Changelog (append-only) ────────────────────────────────────────────────

  async fn append_changelog(&self, entry: NewChangelogEntry) -> Result<ChangelogEntry> {
    let stored = ChangelogEntry {
      changelog_id: Uuid::new_v4(),
      entity_type:  entry.entity_type,
      entity_id:    entry.entity_id,
      change_type:  entry.change_type,
      diff_summary: entry.diff_summary,
      diff_fields:  entry.diff_fields,
      snapshot:     entry.snapshot,
      created_by:   entry.created_by,
      source_ids:   entry.source_ids,
      created_at:   Utc::now(),
    };

    let id_str       = encode_uuid(stored.changelog_id);
    let type_str     = stored.entity_type.to_string();
    let entity_str   = encode_uuid(stored.entity_id);
    let change_str   = stored.change_type.to_string();
    let summary      = stored.diff_summary.clone();
    let diff_str     = encode_diff_fields(&stored.diff_fields)?;
    let snapshot_str = encode_fields(&stored.snapshot)?;
    let created_by   = stored.created_by.clone();
    let sources_str  = encode_ids(&stored.source_ids)?;
    let at_str       = encode_dt(stored.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO changelogs (
             changelog_id, entity_type, entity_id, change_type, diff_summary,
             diff_fields_json, snapshot_json, created_by, source_ids_json, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str,
            type_str,
            entity_str,
            change_str,
            summary,
            diff_str,
            snapshot_str,
            created_by,
            sources_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(stored)
  }

  async fn changelog_for(&self, entity_id: Uuid) -> Result<Vec<ChangelogEntry>> {
    let id_str = encode_uuid(entity_id);

    let raws: Vec<RawChangelog> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHANGELOG_COLUMNS} FROM changelogs
           WHERE entity_id = ?1
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawChangelog::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChangelog::into_entry).collect()
  }

  // ── Editorial reviews ─────────────────────────────────────────────────────

  async fn insert_review(&self, input: NewReview) -> Result<EditorialReview> {
    let review = EditorialReview {
      review_id:     Uuid::new_v4(),
      entity_type:   input.entity_type,
      entity_id:     input.entity_id,
      status:        ReviewStatus::Pending,
      reason:        input.reason,
      notes:         input.notes,
      proposed_data: input.proposed_data,
      diff:          input.diff,
      created_at:    Utc::now(),
      reviewer_uid:  None,
      resolved_at:   None,
    };

    let id_str       = encode_uuid(review.review_id);
    let type_str     = review.entity_type.to_string();
    let entity_str   = review.entity_id.map(encode_uuid);
    let status_str   = review.status.to_string();
    let reason_str   = review.reason.to_string();
    let notes        = review.notes.clone();
    let proposed_str = serde_json::to_string(&review.proposed_data)?;
    let change_str   = review.diff.change_type.to_string();
    let summary      = review.diff.diff_summary.clone();
    let diff_str     = encode_diff_fields(&review.diff.diff_fields)?;
    let sources_str  = encode_ids(&review.diff.source_ids)?;
    let base_version = review.diff.base_version;
    let at_str       = encode_dt(review.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO editorial_reviews (
             review_id, entity_type, entity_id, status, reason, notes,
             proposed_data_json, change_type, diff_summary, diff_fields_json,
             source_ids_json, base_version, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            id_str,
            type_str,
            entity_str,
            status_str,
            reason_str,
            notes,
            proposed_str,
            change_str,
            summary,
            diff_str,
            sources_str,
            base_version,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(review)
  }

  async fn get_review(&self, id: Uuid) -> Result<Option<EditorialReview>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawReview> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {REVIEW_COLUMNS} FROM editorial_reviews WHERE review_id = ?1"),
            rusqlite::params![id_str],
            RawReview::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawReview::into_review).transpose()
  }

  async fn list_reviews(&self, status: Option<ReviewStatus>) -> Result<Vec<EditorialReview>> {
    let status_str = status.map(|s| s.to_string());

    let raws: Vec<RawReview> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REVIEW_COLUMNS} FROM editorial_reviews
           WHERE (?1 IS NULL OR status = ?1)
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![status_str.as_deref()], RawReview::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReview::into_review).collect()
  }

  async fn resolve_review(&self, id: Uuid, resolution: Resolution) -> Result<EditorialReview> {
    let id_str     = encode_uuid(id);
    let status_str = resolution.status().to_string();
    let reviewer   = resolution.reviewer_uid;
    let notes      = resolution.notes;
    let at_str     = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE editorial_reviews SET
             status = ?2, reviewer_uid = ?3, notes = COALESCE(?4, notes), resolved_at = ?5
           WHERE review_id = ?1 AND status = 'pending'",
          rusqlite::params![id_str, status_str, reviewer, notes, at_str],
        )?;

        let raw = conn
          .query_row(
            &format!("SELECT {REVIEW_COLUMNS} FROM editorial_reviews WHERE review_id = ?1"),
            rusqlite::params![id_str],
            RawReview::from_row,
          )
          .optional()?;

        Ok(match (changed, raw) {
          (_, None) => Resolve::Missing,
          (0, Some(_)) => Resolve::AlreadyResolved,
          (_, Some(raw)) => Resolve::Resolved(raw),
        })
      })
      .await?;

    match outcome {
      Resolve::Resolved(raw) => raw.into_review(),
      Resolve::Missing => Err(Error::ReviewNotFound(id)),
      Resolve::AlreadyResolved => Err(Error::ReviewAlreadyResolved(id)),
    }
  }

  // ── Freshness policies ────────────────────────────────────────────────────

  async fn list_freshness_policies(&self) -> Result<Vec<FreshnessPolicy>> {
    let raws: Vec<RawPolicy> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT key, ttl_days, criticality FROM freshness_policies ORDER BY key")?;
        let rows = stmt
          .query_map([], RawPolicy::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPolicy::into_policy).collect()
  }

  async fn put_freshness_policy(&self, policy: FreshnessPolicy) -> Result<()> {
    let ttl = i64::from(policy.ttl_days);
    let criticality = policy.criticality.to_string();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO freshness_policies (key, ttl_days, criticality)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET
             ttl_days = excluded.ttl_days, criticality = excluded.criticality",
          rusqlite::params![policy.key, ttl, criticality],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
