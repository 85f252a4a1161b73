//! SQL schema for the passagr SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for later migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sources (
    source_id         TEXT PRIMARY KEY,
    url               TEXT NOT NULL UNIQUE,
    title             TEXT,
    publisher         TEXT,
    content_type      TEXT,
    excerpt           TEXT,
    fetched_at        TEXT NOT NULL,
    last_checked_at   TEXT,
    reliability_score INTEGER NOT NULL DEFAULT 5
                      CHECK (reliability_score BETWEEN 0 AND 10)
);

-- Canonical published state. Written only by the publisher; `version` is the
-- optimistic-concurrency token.
CREATE TABLE IF NOT EXISTS entities (
    entity_id        TEXT PRIMARY KEY,
    entity_type      TEXT NOT NULL,   -- 'country' | 'visa_path' | 'requirement' | 'step'
    fields_json      TEXT NOT NULL,
    status           TEXT NOT NULL CHECK (status IN ('published', 'unpublished')),
    version          INTEGER NOT NULL CHECK (version >= 1),
    last_verified_at TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

-- Changelogs are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS changelogs (
    changelog_id     TEXT PRIMARY KEY,
    entity_type      TEXT NOT NULL,
    entity_id        TEXT NOT NULL,
    change_type      TEXT NOT NULL CHECK (change_type IN ('add', 'update', 'remove')),
    diff_summary     TEXT NOT NULL,
    diff_fields_json TEXT NOT NULL DEFAULT '[]',
    snapshot_json    TEXT NOT NULL DEFAULT '{}',
    created_by       TEXT NOT NULL,
    source_ids_json  TEXT NOT NULL DEFAULT '[]',
    created_at       TEXT NOT NULL
);

-- Reviews are never deleted; status moves from 'pending' exactly once.
CREATE TABLE IF NOT EXISTS editorial_reviews (
    review_id          TEXT PRIMARY KEY,
    entity_type        TEXT NOT NULL,
    entity_id          TEXT,
    status             TEXT NOT NULL DEFAULT 'pending'
                       CHECK (status IN ('pending', 'approved', 'rejected')),
    reason             TEXT NOT NULL,
    notes              TEXT,
    proposed_data_json TEXT NOT NULL,
    change_type        TEXT NOT NULL,
    diff_summary       TEXT NOT NULL,
    diff_fields_json   TEXT NOT NULL DEFAULT '[]',
    source_ids_json    TEXT NOT NULL DEFAULT '[]',
    base_version       INTEGER,
    created_at         TEXT NOT NULL,
    reviewer_uid       TEXT,
    resolved_at        TEXT
);

CREATE TABLE IF NOT EXISTS freshness_policies (
    key         TEXT PRIMARY KEY,
    ttl_days    INTEGER NOT NULL CHECK (ttl_days >= 0),
    criticality TEXT NOT NULL
                CHECK (criticality IN ('critical', 'high', 'medium', 'low'))
);

CREATE INDEX IF NOT EXISTS entities_type_idx      ON entities(entity_type);
CREATE INDEX IF NOT EXISTS changelogs_entity_idx  ON changelogs(entity_id, created_at);
CREATE INDEX IF NOT EXISTS reviews_status_idx     ON editorial_reviews(status);
CREATE INDEX IF NOT EXISTS sources_checked_idx    ON sources(last_checked_at);

PRAGMA user_version = 1;
";
