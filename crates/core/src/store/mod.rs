pub mod schema;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::domain::*;
use crate::error::{Error, Result};

/// SQLite-backed store for sessions, photos and the access-attempt log.
///
/// All counter mutations happen inside the same transaction as the photo
/// row they reflect, so the cached aggregates on the session row can never
/// diverge from the committed photo set. SQLite serializes write
/// transactions, which subsumes the per-session mutual exclusion the
/// counters need.
pub struct Store {
    conn: Connection,
}

/// Input for a photo row produced by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub session_id: i64,
    pub uploader: Option<String>,
    pub unique_name: String,
    pub original_name: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub sha256: String,
    pub status: PhotoStatus,
    pub watermark_applied: bool,
    pub variants: Vec<Variant>,
}

/// Input for a new session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub owner: String,
    pub name: String,
    pub visibility: Visibility,
    pub access_code: Option<String>,
    pub review_mode: bool,
    pub watermark: WatermarkSettings,
}

/// Result of a status transition. `changed` is false when the photo was
/// already in the target state (idempotent retry) — counters untouched.
#[derive(Debug)]
pub struct Transition {
    pub photo: Photo,
    pub changed: bool,
}

const SESSION_COLS: &str = "id, owner, name, visibility, access_code, status, review_mode,
     watermark_enabled, watermark_text, watermark_opacity,
     total_photos, pending_photos, published_photos, rejected_photos, archived_photos,
     view_count, created_at,
     (SELECT COUNT(*) FROM session_viewers sv WHERE sv.session_id = sessions.id)";

const PHOTO_COLS: &str = "id, session_id, uploader, unique_name, original_name, format,
     width, height, size, sha256, status, watermark_applied,
     reviewed_by, review_notes, reviewed_at, published_at, created_at";

fn counter_column(status: PhotoStatus) -> &'static str {
    match status {
        PhotoStatus::Pending => "pending_photos",
        PhotoStatus::Published => "published_photos",
        PhotoStatus::Rejected => "rejected_photos",
        PhotoStatus::Archived => "archived_photos",
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Store {
    /// Open or create a store at the given path with WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    // ── Sessions ─────────────────────────────────────────────────────

    pub fn create_session(&self, new: &NewSession) -> Result<Session> {
        if new.owner.is_empty() {
            return Err(Error::MalformedRecord(
                "session owner must not be empty".to_string(),
            ));
        }
        self.conn.execute(
            "INSERT INTO sessions (owner, name, visibility, access_code, status, review_mode,
                 watermark_enabled, watermark_text, watermark_opacity, created_at)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, ?7, ?8, ?9)",
            params![
                new.owner,
                new.name,
                new.visibility.as_str(),
                new.access_code,
                new.review_mode,
                new.watermark.enabled,
                new.watermark.text,
                new.watermark.opacity as f64,
                now_ts(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(session_id = id, owner = %new.owner, "session created");
        self.get_session(id)
    }

    pub fn get_session(&self, id: i64) -> Result<Session> {
        self.find_session(id)?.ok_or(Error::SessionNotFound(id))
    }

    pub fn find_session(&self, id: i64) -> Result<Option<Session>> {
        let session = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLS} FROM sessions WHERE id = ?1"),
                params![id],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SESSION_COLS} FROM sessions ORDER BY id"))?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    pub fn set_session_status(&self, id: i64, status: SessionStatus) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE sessions SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            return Err(Error::SessionNotFound(id));
        }
        Ok(())
    }

    pub fn set_watermark(&self, id: i64, watermark: &WatermarkSettings) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE sessions SET watermark_enabled = ?1, watermark_text = ?2,
                 watermark_opacity = ?3 WHERE id = ?4",
            params![
                watermark.enabled,
                watermark.text,
                watermark.opacity as f64,
                id
            ],
        )?;
        if updated == 0 {
            return Err(Error::SessionNotFound(id));
        }
        Ok(())
    }

    /// Delete a session. Refuses while photos remain unless `cascade`.
    /// Returns the deleted session and the variant paths whose blob files
    /// the caller must remove.
    pub fn delete_session(&mut self, id: i64, cascade: bool) -> Result<(Session, Vec<String>)> {
        let session = self.get_session(id)?;
        if !cascade && session.counters.total > 0 {
            return Err(Error::SessionHasPhotos(id));
        }

        let tx = self.conn.transaction()?;
        let mut paths = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT pv.path FROM photo_variants pv
                 JOIN photos p ON p.id = pv.photo_id
                 WHERE p.session_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
            for row in rows {
                paths.push(row?);
            }
        }
        tx.execute(
            "DELETE FROM photo_variants WHERE photo_id IN
                 (SELECT id FROM photos WHERE session_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM photos WHERE session_id = ?1", params![id])?;
        tx.execute(
            "DELETE FROM access_attempts WHERE session_id = ?1",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM session_viewers WHERE session_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        tx.commit()?;

        Ok((session, paths))
    }

    // ── Photos & counter consistency ─────────────────────────────────

    /// Insert a photo and bump the session counters in one transaction.
    /// If the session vanished mid-operation the whole insert rolls back.
    pub fn insert_photo(&mut self, new: &NewPhoto) -> Result<Photo> {
        let tx = self.conn.transaction()?;
        let now = now_ts();
        let published_at = (new.status == PhotoStatus::Published).then_some(now);

        tx.execute(
            "INSERT INTO photos (session_id, uploader, unique_name, original_name, format,
                 width, height, size, sha256, status, watermark_applied, published_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                new.session_id,
                new.uploader,
                new.unique_name,
                new.original_name,
                new.format,
                new.width,
                new.height,
                new.size as i64,
                new.sha256,
                new.status.as_str(),
                new.watermark_applied,
                published_at,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();

        for v in &new.variants {
            tx.execute(
                "INSERT INTO photo_variants (photo_id, variant, path, width, height, size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, v.name, v.path, v.width, v.height, v.size as i64],
            )?;
        }

        let col = counter_column(new.status);
        let updated = tx.execute(
            &format!(
                "UPDATE sessions SET total_photos = total_photos + 1, {col} = {col} + 1
                 WHERE id = ?1"
            ),
            params![new.session_id],
        )?;
        if updated == 0 {
            // Dropping the transaction rolls the photo row back with it.
            return Err(Error::SessionNotFound(new.session_id));
        }

        tx.commit()?;
        self.get_photo(id)
    }

    /// Move a photo to `to`, adjusting the session counters atomically.
    ///
    /// Repeating a transition the photo has already made is a no-op
    /// (`changed == false`), so a retried request cannot double-adjust
    /// counters. Any other disallowed move is an `InvalidTransition`.
    pub fn transition_photo(
        &mut self,
        photo_id: i64,
        to: PhotoStatus,
        reviewer: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Transition> {
        let tx = self.conn.transaction()?;

        let row: Option<(i64, String)> = tx
            .query_row(
                "SELECT session_id, status FROM photos WHERE id = ?1",
                params![photo_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (session_id, status_str) = row.ok_or(Error::PhotoNotFound(photo_id))?;
        let from = PhotoStatus::parse(&status_str);

        if from == to {
            drop(tx);
            return Ok(Transition {
                photo: self.get_photo(photo_id)?,
                changed: false,
            });
        }
        if !from.can_transition(to) {
            return Err(Error::InvalidTransition { from, to });
        }

        let now = now_ts();
        // Review fields are recorded only for the pending → decision step.
        let (reviewed_by, review_notes, reviewed_at) = if from == PhotoStatus::Pending {
            (reviewer, notes, Some(now))
        } else {
            (None, None, None)
        };
        let published_at = (to == PhotoStatus::Published).then_some(now);

        tx.execute(
            "UPDATE photos SET status = ?1,
                 reviewed_by = COALESCE(?2, reviewed_by),
                 review_notes = COALESCE(?3, review_notes),
                 reviewed_at = COALESCE(?4, reviewed_at),
                 published_at = COALESCE(?5, published_at)
             WHERE id = ?6 AND status = ?7",
            params![
                to.as_str(),
                reviewed_by,
                review_notes,
                reviewed_at,
                published_at,
                photo_id,
                from.as_str(),
            ],
        )?;

        let from_col = counter_column(from);
        let to_col = counter_column(to);
        let updated = tx.execute(
            &format!(
                "UPDATE sessions SET {from_col} = {from_col} - 1, {to_col} = {to_col} + 1
                 WHERE id = ?1"
            ),
            params![session_id],
        )?;
        if updated == 0 {
            return Err(Error::SessionNotFound(session_id));
        }

        tx.commit()?;
        debug!(photo_id, from = %from, to = %to, "photo transitioned");
        Ok(Transition {
            photo: self.get_photo(photo_id)?,
            changed: true,
        })
    }

    /// Delete a photo row and its variant rows, decrementing counters.
    /// Returns the deleted photo and the blob paths to remove.
    pub fn delete_photo(&mut self, photo_id: i64) -> Result<(Photo, Vec<String>)> {
        let photo = self.get_photo(photo_id)?;
        let paths: Vec<String> = photo.variants.iter().map(|v| v.path.clone()).collect();

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM photo_variants WHERE photo_id = ?1",
            params![photo_id],
        )?;
        tx.execute("DELETE FROM photos WHERE id = ?1", params![photo_id])?;

        let col = counter_column(photo.status);
        let updated = tx.execute(
            &format!(
                "UPDATE sessions SET total_photos = total_photos - 1, {col} = {col} - 1
                 WHERE id = ?1"
            ),
            params![photo.session_id],
        )?;
        if updated == 0 {
            return Err(Error::SessionNotFound(photo.session_id));
        }
        tx.commit()?;

        Ok((photo, paths))
    }

    pub fn get_photo(&self, id: i64) -> Result<Photo> {
        let mut photo = self
            .conn
            .query_row(
                &format!("SELECT {PHOTO_COLS} FROM photos WHERE id = ?1"),
                params![id],
                photo_from_row,
            )
            .optional()?
            .ok_or(Error::PhotoNotFound(id))?;
        photo.variants = self.variants_for_photo(id)?;
        Ok(photo)
    }

    pub fn photos_for_session(&self, session_id: i64) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_COLS} FROM photos WHERE session_id = ?1 ORDER BY id"
        ))?;
        let mut photos = stmt
            .query_map(params![session_id], photo_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Single JOIN query for variants to avoid N+1.
        let mut vstmt = self.conn.prepare(
            "SELECT pv.photo_id, pv.variant, pv.path, pv.width, pv.height, pv.size
             FROM photo_variants pv
             JOIN photos p ON p.id = pv.photo_id
             WHERE p.session_id = ?1",
        )?;
        let rows = vstmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Variant {
                        name: row.get(1)?,
                        path: row.get(2)?,
                        width: row.get(3)?,
                        height: row.get(4)?,
                        size: row.get::<_, i64>(5)? as u64,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut by_photo: HashMap<i64, Vec<Variant>> = HashMap::new();
        for (photo_id, variant) in rows {
            by_photo.entry(photo_id).or_default().push(variant);
        }
        for photo in &mut photos {
            photo.variants = by_photo.remove(&photo.id).unwrap_or_default();
        }
        Ok(photos)
    }

    fn variants_for_photo(&self, photo_id: i64) -> Result<Vec<Variant>> {
        let mut stmt = self.conn.prepare(
            "SELECT variant, path, width, height, size FROM photo_variants WHERE photo_id = ?1",
        )?;
        let variants = stmt
            .query_map(params![photo_id], |row| {
                Ok(Variant {
                    name: row.get(0)?,
                    path: row.get(1)?,
                    width: row.get(2)?,
                    height: row.get(3)?,
                    size: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(variants)
    }

    /// All stored variant paths, for the orphan sweep.
    pub fn all_variant_paths(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM photo_variants")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(paths)
    }

    // ── Access attempts & views ──────────────────────────────────────

    pub fn record_access_attempt(
        &self,
        session_id: i64,
        origin: Option<&str>,
        supplied_code: Option<&str>,
        granted: bool,
        reason: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO access_attempts (session_id, origin, supplied_code, granted, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![session_id, origin, supplied_code, granted, reason, now_ts()],
        )?;
        Ok(())
    }

    pub fn list_access_attempts(&self, session_id: i64) -> Result<Vec<AccessAttempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, origin, supplied_code, granted, reason, created_at
             FROM access_attempts WHERE session_id = ?1 ORDER BY id",
        )?;
        let attempts = stmt
            .query_map(params![session_id], |row| {
                Ok(AccessAttempt {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    origin: row.get(2)?,
                    supplied_code: row.get(3)?,
                    granted: row.get(4)?,
                    reason: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(attempts)
    }

    /// Count a view. `viewer_key` (cookie, IP hash — the transport decides)
    /// deduplicates the unique-viewer count.
    pub fn record_view(&mut self, session_id: i64, viewer_key: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE sessions SET view_count = view_count + 1 WHERE id = ?1",
            params![session_id],
        )?;
        if updated == 0 {
            return Err(Error::SessionNotFound(session_id));
        }
        tx.execute(
            "INSERT OR IGNORE INTO session_viewers (session_id, viewer_key) VALUES (?1, ?2)",
            params![session_id, viewer_key],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Recompute every session's counters from its actual photo rows.
    /// Safety net for crashes mid-pipeline; returns the number of sessions
    /// that needed correction.
    pub fn reconcile_counters(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut corrected = 0usize;
        {
            let mut stmt = tx.prepare(
                "SELECT s.id,
                        s.total_photos, s.pending_photos, s.published_photos,
                        s.rejected_photos, s.archived_photos,
                        (SELECT COUNT(*) FROM photos p WHERE p.session_id = s.id),
                        (SELECT COUNT(*) FROM photos p WHERE p.session_id = s.id AND p.status = 'pending'),
                        (SELECT COUNT(*) FROM photos p WHERE p.session_id = s.id AND p.status = 'published'),
                        (SELECT COUNT(*) FROM photos p WHERE p.session_id = s.id AND p.status = 'rejected'),
                        (SELECT COUNT(*) FROM photos p WHERE p.session_id = s.id AND p.status = 'archived')
                 FROM sessions s",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    let mut stored = [0i64; 5];
                    let mut actual = [0i64; 5];
                    for i in 0..5 {
                        stored[i] = row.get(1 + i)?;
                        actual[i] = row.get(6 + i)?;
                    }
                    Ok((id, stored, actual))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for (id, stored, actual) in rows {
                if stored != actual {
                    warn!(
                        session_id = id,
                        ?stored,
                        ?actual,
                        "session counters diverged; reconciling"
                    );
                    tx.execute(
                        "UPDATE sessions SET total_photos = ?1, pending_photos = ?2,
                             published_photos = ?3, rejected_photos = ?4, archived_photos = ?5
                         WHERE id = ?6",
                        params![actual[0], actual[1], actual[2], actual[3], actual[4], id],
                    )?;
                    corrected += 1;
                }
            }
        }
        tx.commit()?;
        Ok(corrected)
    }

    // ── Config ───────────────────────────────────────────────────────

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        visibility: Visibility::parse(&row.get::<_, String>(3)?),
        access_code: row.get(4)?,
        status: SessionStatus::parse(&row.get::<_, String>(5)?),
        review_mode: row.get(6)?,
        watermark: WatermarkSettings {
            enabled: row.get(7)?,
            text: row.get(8)?,
            opacity: row.get::<_, f64>(9)? as f32,
        },
        counters: SessionCounters {
            total: row.get(10)?,
            pending: row.get(11)?,
            published: row.get(12)?,
            rejected: row.get(13)?,
            archived: row.get(14)?,
        },
        view_count: row.get(15)?,
        created_at: row.get(16)?,
        unique_viewers: row.get(17)?,
    })
}

fn photo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        session_id: row.get(1)?,
        uploader: row.get(2)?,
        unique_name: row.get(3)?,
        original_name: row.get(4)?,
        format: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        size: row.get::<_, i64>(8)? as u64,
        sha256: row.get(9)?,
        status: PhotoStatus::parse(&row.get::<_, String>(10)?),
        watermark_applied: row.get(11)?,
        reviewed_by: row.get(12)?,
        review_notes: row.get(13)?,
        reviewed_at: row.get(14)?,
        published_at: row.get(15)?,
        created_at: row.get(16)?,
        variants: Vec::new(),
    })
}
