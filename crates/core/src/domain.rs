use std::fmt;

use serde::Serialize;

/// Who is asking. The transport layer resolves authentication before the
/// core ever sees a request; here identity is already decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    Anonymous,
    User { id: String, admin: bool },
}

impl Requester {
    pub fn user(id: impl Into<String>) -> Self {
        Requester::User {
            id: id.into(),
            admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Requester::User {
            id: id.into(),
            admin: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Visibility {
        match s {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Active,
    Paused,
    Ended,
    Archived,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Ended => "ended",
            SessionStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> SessionStatus {
        match s {
            "paused" => SessionStatus::Paused,
            "ended" => SessionStatus::Ended,
            "archived" => SessionStatus::Archived,
            _ => SessionStatus::Active,
        }
    }
}

/// Review/publish status of a single photo.
///
/// The legal transitions form a small state machine:
/// pending → published | rejected, published → archived,
/// rejected → archived. Archived is terminal; in particular a pending
/// photo may not be archived without a review decision first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PhotoStatus {
    Pending,
    Published,
    Rejected,
    Archived,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Pending => "pending",
            PhotoStatus::Published => "published",
            PhotoStatus::Rejected => "rejected",
            PhotoStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> PhotoStatus {
        match s {
            "published" => PhotoStatus::Published,
            "rejected" => PhotoStatus::Rejected,
            "archived" => PhotoStatus::Archived,
            _ => PhotoStatus::Pending,
        }
    }

    /// Initial status for a freshly ingested photo.
    pub fn initial(review_mode: bool) -> PhotoStatus {
        if review_mode {
            PhotoStatus::Pending
        } else {
            PhotoStatus::Published
        }
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition(&self, to: PhotoStatus) -> bool {
        matches!(
            (self, to),
            (PhotoStatus::Pending, PhotoStatus::Published)
                | (PhotoStatus::Pending, PhotoStatus::Rejected)
                | (PhotoStatus::Published, PhotoStatus::Archived)
                | (PhotoStatus::Rejected, PhotoStatus::Archived)
        )
    }
}

impl fmt::Display for PhotoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkSettings {
    pub enabled: bool,
    pub text: String,
    pub opacity: f32,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            text: String::new(),
            opacity: 0.35,
        }
    }
}

/// Aggregate photo counts cached on the session row. Written only by the
/// store's counter-consistency paths, never directly by callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    pub total: i64,
    pub pending: i64,
    pub published: i64,
    pub rejected: i64,
    pub archived: i64,
}

impl SessionCounters {
    /// The invariant the store maintains: the status counters partition
    /// the total.
    pub fn is_consistent(&self) -> bool {
        self.total == self.pending + self.published + self.rejected + self.archived
    }

    pub fn for_status(&self, status: PhotoStatus) -> i64 {
        match status {
            PhotoStatus::Pending => self.pending,
            PhotoStatus::Published => self.published,
            PhotoStatus::Rejected => self.rejected,
            PhotoStatus::Archived => self.archived,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub visibility: Visibility,
    pub access_code: Option<String>,
    pub status: SessionStatus,
    pub review_mode: bool,
    pub watermark: WatermarkSettings,
    pub counters: SessionCounters,
    pub view_count: i64,
    pub unique_viewers: i64,
    pub created_at: i64,
}

/// One stored derivative of a photo (the original counts as a variant too).
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub name: String,
    /// Path relative to the media root.
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub id: i64,
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
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<i64>,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub variants: Vec<Variant>,
}

impl Photo {
    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// Append-only audit row for code-gated access checks.
#[derive(Debug, Clone, Serialize)]
pub struct AccessAttempt {
    pub id: i64,
    pub session_id: i64,
    pub origin: Option<String>,
    pub supplied_code: Option<String>,
    pub granted: bool,
    pub reason: String,
    pub created_at: i64,
}

/// Emitted after a successful ingestion or status change, for the
/// out-of-scope real-time fan-out layer.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoEvent {
    pub session_id: i64,
    pub photo_id: i64,
    pub status: PhotoStatus,
    pub variant_paths: Vec<String>,
}

impl PhotoEvent {
    pub fn from_photo(photo: &Photo) -> Self {
        Self {
            session_id: photo.session_id,
            photo_id: photo.id,
            status: photo.status,
            variant_paths: photo.variants.iter().map(|v| v.path.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_follows_review_mode() {
        assert_eq!(PhotoStatus::initial(true), PhotoStatus::Pending);
        assert_eq!(PhotoStatus::initial(false), PhotoStatus::Published);
    }

    #[test]
    fn test_legal_transitions() {
        assert!(PhotoStatus::Pending.can_transition(PhotoStatus::Published));
        assert!(PhotoStatus::Pending.can_transition(PhotoStatus::Rejected));
        assert!(PhotoStatus::Published.can_transition(PhotoStatus::Archived));
        assert!(PhotoStatus::Rejected.can_transition(PhotoStatus::Archived));
    }

    #[test]
    fn test_pending_cannot_skip_review_into_archive() {
        assert!(!PhotoStatus::Pending.can_transition(PhotoStatus::Archived));
    }

    #[test]
    fn test_archived_is_terminal() {
        for to in [
            PhotoStatus::Pending,
            PhotoStatus::Published,
            PhotoStatus::Rejected,
        ] {
            assert!(!PhotoStatus::Archived.can_transition(to));
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for s in [
            PhotoStatus::Pending,
            PhotoStatus::Published,
            PhotoStatus::Rejected,
            PhotoStatus::Archived,
        ] {
            assert!(!s.can_transition(s));
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for s in [
            PhotoStatus::Pending,
            PhotoStatus::Published,
            PhotoStatus::Rejected,
            PhotoStatus::Archived,
        ] {
            assert_eq!(PhotoStatus::parse(s.as_str()), s);
        }
    }

    #[test]
    fn test_counters_partition() {
        let c = SessionCounters {
            total: 10,
            pending: 2,
            published: 5,
            rejected: 1,
            archived: 2,
        };
        assert!(c.is_consistent());

        let broken = SessionCounters { total: 9, ..c };
        assert!(!broken.is_consistent());
    }
}
