use rusqlite::Connection;

use crate::error::{Error, Result};

/// Newest schema version this build understands.
pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            owner             TEXT NOT NULL,
            name              TEXT NOT NULL,
            visibility        TEXT NOT NULL,
            access_code       TEXT,
            status            TEXT NOT NULL DEFAULT 'active',
            review_mode       INTEGER NOT NULL DEFAULT 0,
            watermark_enabled INTEGER NOT NULL DEFAULT 0,
            watermark_text    TEXT NOT NULL DEFAULT '',
            watermark_opacity REAL NOT NULL DEFAULT 0.35,
            total_photos      INTEGER NOT NULL DEFAULT 0,
            pending_photos    INTEGER NOT NULL DEFAULT 0,
            published_photos  INTEGER NOT NULL DEFAULT 0,
            rejected_photos   INTEGER NOT NULL DEFAULT 0,
            archived_photos   INTEGER NOT NULL DEFAULT 0,
            view_count        INTEGER NOT NULL DEFAULT 0,
            created_at        INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS session_viewers (
            session_id  INTEGER NOT NULL REFERENCES sessions(id),
            viewer_key  TEXT NOT NULL,
            PRIMARY KEY (session_id, viewer_key)
        );

        CREATE TABLE IF NOT EXISTS photos (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id        INTEGER NOT NULL REFERENCES sessions(id),
            uploader          TEXT,
            unique_name       TEXT NOT NULL UNIQUE,
            original_name     TEXT NOT NULL,
            format            TEXT NOT NULL,
            width             INTEGER NOT NULL,
            height            INTEGER NOT NULL,
            size              INTEGER NOT NULL,
            sha256            TEXT NOT NULL,
            status            TEXT NOT NULL,
            watermark_applied INTEGER NOT NULL DEFAULT 0,
            reviewed_by       TEXT,
            review_notes      TEXT,
            reviewed_at       INTEGER,
            published_at      INTEGER,
            created_at        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_photos_session ON photos(session_id);
        CREATE INDEX IF NOT EXISTS idx_photos_session_status ON photos(session_id, status);

        CREATE TABLE IF NOT EXISTS photo_variants (
            photo_id    INTEGER NOT NULL REFERENCES photos(id),
            variant     TEXT NOT NULL,
            path        TEXT NOT NULL,
            width       INTEGER NOT NULL,
            height      INTEGER NOT NULL,
            size        INTEGER NOT NULL,
            PRIMARY KEY (photo_id, variant)
        );

        CREATE INDEX IF NOT EXISTS idx_variants_path ON photo_variants(path);

        CREATE TABLE IF NOT EXISTS access_attempts (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id    INTEGER NOT NULL REFERENCES sessions(id),
            origin        TEXT,
            supplied_code TEXT,
            granted       INTEGER NOT NULL,
            reason        TEXT NOT NULL,
            created_at    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attempts_session ON access_attempts(session_id);

        CREATE TABLE IF NOT EXISTS config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Bring an existing database up to `SCHEMA_VERSION`. Refuses databases
/// written by a newer build.
pub fn migrate(conn: &Connection) -> Result<()> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM config WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();

    let db_version = version.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);

    if db_version > SCHEMA_VERSION {
        return Err(Error::MalformedRecord(format!(
            "database schema version {db_version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    // No migrations between 0 and 1 — v0 databases predate version
    // tracking but carry the same tables.
    conn.execute(
        "INSERT INTO config (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}
