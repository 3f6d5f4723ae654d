pub mod access;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod store;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use access::{AccessReason, Decision};
use domain::*;
use error::{Error, Result};
use pipeline::{IngestConfig, Pipeline, ProcessedPhoto, Upload};
use storage::{remove_blobs, FsStore};
use store::{NewPhoto, NewSession, Store, Transition};

pub use store::Transition as PhotoTransition;

/// Callback for reporting ingestion progress.
pub enum IngestProgress {
    /// Starting a batch of uploads.
    BatchStart { file_count: usize },
    /// A file made it through the pipeline and into the database.
    FileIngested { original_name: String },
    /// A file failed; the batch continues.
    FileFailed { original_name: String },
    /// Batch finished.
    BatchComplete { succeeded: usize, failed: usize },
}

/// One upload that failed inside a batch.
#[derive(Debug)]
pub struct IngestFailure {
    pub original_name: String,
    pub error: Error,
}

/// Outcome of a batch ingestion. One bad file never sinks the batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub photos: Vec<Photo>,
    pub failures: Vec<IngestFailure>,
    /// Published-photo notifications for the transport layer to fan out.
    pub events: Vec<PhotoEvent>,
    pub warnings: Vec<String>,
}

/// The main entry point for the ShootShare library.
///
/// Owns the SQLite store and the media blob root under one data directory:
/// `gallery.db` next to a `media/` tree.
pub struct Gallery {
    store: Store,
    blobs: FsStore,
    config: IngestConfig,
}

impl Gallery {
    /// Open or create a gallery rooted at `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        Self::open_with_config(data_dir, IngestConfig::default())
    }

    pub fn open_with_config(data_dir: &Path, config: IngestConfig) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let media_root = data_dir.join("media");
        std::fs::create_dir_all(&media_root)?;
        let store = Store::open(&data_dir.join("gallery.db"))?;
        Ok(Self {
            store,
            blobs: FsStore::new(media_root),
            config,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn media_root(&self) -> &Path {
        self.blobs.root()
    }

    // ---- Sessions ----

    /// Create a session. `review_mode` and the watermark opacity fall back
    /// to the configured defaults when not given.
    pub fn create_session(
        &self,
        owner: &str,
        name: &str,
        visibility: Visibility,
        access_code: Option<String>,
        review_mode: Option<bool>,
        watermark: Option<WatermarkSettings>,
    ) -> Result<Session> {
        let mut watermark = watermark.unwrap_or_default();
        if watermark.enabled && watermark.opacity <= 0.0 {
            watermark.opacity = self.config.default_watermark_opacity;
        }
        self.store.create_session(&NewSession {
            owner: owner.to_string(),
            name: name.to_string(),
            visibility,
            access_code,
            review_mode: review_mode.unwrap_or(self.config.default_review_mode),
            watermark,
        })
    }

    pub fn session(&self, id: i64) -> Result<Session> {
        self.store.get_session(id)
    }

    pub fn sessions(&self) -> Result<Vec<Session>> {
        self.store.list_sessions()
    }

    pub fn set_session_status(
        &mut self,
        requester: &Requester,
        id: i64,
        status: SessionStatus,
    ) -> Result<()> {
        let session = self.store.get_session(id)?;
        ensure_owner_or_admin(requester, &session)?;
        self.store.set_session_status(id, status)
    }

    pub fn set_watermark(
        &mut self,
        requester: &Requester,
        id: i64,
        watermark: &WatermarkSettings,
    ) -> Result<()> {
        let session = self.store.get_session(id)?;
        ensure_owner_or_admin(requester, &session)?;
        self.store.set_watermark(id, watermark)
    }

    /// Delete a session. Refuses while photos remain unless `cascade`;
    /// cascading removes every blob the session owned.
    pub fn delete_session(
        &mut self,
        requester: &Requester,
        id: i64,
        cascade: bool,
    ) -> Result<Session> {
        let session = self.store.get_session(id)?;
        ensure_owner_or_admin(requester, &session)?;
        let (session, paths) = self.store.delete_session(id, cascade)?;
        remove_blobs(&self.blobs, &paths);
        info!(session = id, blobs = paths.len(), "session deleted");
        Ok(session)
    }

    // ---- Access ----

    /// Run the access decision for `session_id` and record the attempt when
    /// the decision says so. An unknown session yields the same unlogged
    /// denial as a failed code, so probing for session ids learns nothing.
    pub fn check_access(
        &self,
        requester: &Requester,
        session_id: i64,
        supplied_code: Option<&str>,
        origin: Option<&str>,
    ) -> Result<Decision> {
        let Some(session) = self.store.find_session(session_id)? else {
            return Ok(Decision {
                granted: false,
                reason: AccessReason::NoMatch,
                should_log: false,
            });
        };
        let decision = access::decide(requester, &session, supplied_code)?;
        if decision.should_log {
            self.store.record_access_attempt(
                session_id,
                origin,
                supplied_code,
                decision.granted,
                decision.reason.as_str(),
            )?;
        }
        Ok(decision)
    }

    /// Count a gallery view. `viewer_key` dedupes the unique-viewer count.
    pub fn record_view(&mut self, session_id: i64, viewer_key: &str) -> Result<()> {
        self.store.record_view(session_id, viewer_key)
    }

    pub fn access_log(&self, session_id: i64) -> Result<Vec<AccessAttempt>> {
        self.store.list_access_attempts(session_id)
    }

    // ---- Ingestion ----

    /// Ingest a batch of uploads into `session_id`.
    ///
    /// The session must be active and the requester must pass the access
    /// decision. Pipelines run in parallel with no database access; rows
    /// and counters are then written sequentially, one transaction per
    /// photo. A file whose blobs landed but whose row insert failed has its
    /// blobs removed and is reported as a failure.
    pub fn ingest(
        &mut self,
        requester: &Requester,
        session_id: i64,
        supplied_code: Option<&str>,
        uploads: &[Upload],
        mut progress_cb: Option<&mut dyn FnMut(IngestProgress)>,
    ) -> Result<BatchOutcome> {
        let session = self.store.get_session(session_id)?;
        if session.status != SessionStatus::Active {
            return Err(Error::SessionNotActive(session_id));
        }
        let decision = access::decide(requester, &session, supplied_code)?;
        if decision.should_log {
            self.store.record_access_attempt(
                session_id,
                None,
                supplied_code,
                decision.granted,
                decision.reason.as_str(),
            )?;
        }
        if !decision.granted {
            return Err(Error::AccessDenied(decision.reason.as_str()));
        }

        if let Some(ref mut cb) = progress_cb {
            cb(IngestProgress::BatchStart {
                file_count: uploads.len(),
            });
        }

        // Parallel phase: decode, resize, watermark, blob writes.
        let pipeline = Pipeline::new(&self.blobs, &self.config);
        let results: Vec<(String, Result<ProcessedPhoto>)> = uploads
            .par_iter()
            .map(|upload| (upload.original_name.clone(), pipeline.process(&session, upload)))
            .collect();

        // Sequential phase: one row-plus-counters transaction per photo.
        let status = PhotoStatus::initial(session.review_mode);
        let uploader = match requester {
            Requester::User { id, .. } => Some(id.clone()),
            Requester::Anonymous => None,
        };

        let mut outcome = BatchOutcome {
            photos: Vec::new(),
            failures: Vec::new(),
            events: Vec::new(),
            warnings: Vec::new(),
        };
        for (original_name, result) in results {
            match result {
                Ok(processed) => {
                    outcome.warnings.extend(processed.warnings.iter().cloned());
                    match self.insert_processed(&session, &uploader, &original_name, processed, status) {
                        Ok(photo) => {
                            if let Some(ref mut cb) = progress_cb {
                                cb(IngestProgress::FileIngested {
                                    original_name: original_name.clone(),
                                });
                            }
                            if photo.status == PhotoStatus::Published {
                                outcome.events.push(PhotoEvent::from_photo(&photo));
                            }
                            outcome.photos.push(photo);
                        }
                        Err(error) => {
                            if let Some(ref mut cb) = progress_cb {
                                cb(IngestProgress::FileFailed {
                                    original_name: original_name.clone(),
                                });
                            }
                            outcome.failures.push(IngestFailure {
                                original_name,
                                error,
                            });
                        }
                    }
                }
                Err(error) => {
                    warn!(name = %original_name, %error, "upload failed");
                    if let Some(ref mut cb) = progress_cb {
                        cb(IngestProgress::FileFailed {
                            original_name: original_name.clone(),
                        });
                    }
                    outcome.failures.push(IngestFailure {
                        original_name,
                        error,
                    });
                }
            }
        }

        if let Some(ref mut cb) = progress_cb {
            cb(IngestProgress::BatchComplete {
                succeeded: outcome.photos.len(),
                failed: outcome.failures.len(),
            });
        }
        info!(
            session = session_id,
            succeeded = outcome.photos.len(),
            failed = outcome.failures.len(),
            "batch ingested"
        );
        Ok(outcome)
    }

    fn insert_processed(
        &mut self,
        session: &Session,
        uploader: &Option<String>,
        original_name: &str,
        processed: ProcessedPhoto,
        status: PhotoStatus,
    ) -> Result<Photo> {
        let paths: Vec<String> = processed.variants.iter().map(|v| v.path.clone()).collect();
        let inserted = self.store.insert_photo(&NewPhoto {
            session_id: session.id,
            uploader: uploader.clone(),
            unique_name: processed.unique_name,
            original_name: original_name.to_string(),
            format: processed.format,
            width: processed.width,
            height: processed.height,
            size: processed.size,
            sha256: processed.sha256,
            status,
            watermark_applied: processed.watermark_applied,
            variants: processed.variants,
        });
        match inserted {
            Ok(photo) => Ok(photo),
            Err(e) => {
                // Blobs are already on disk; do not strand them.
                remove_blobs(&self.blobs, &paths);
                Err(e)
            }
        }
    }

    // ---- Review ----

    /// Publish a pending photo. Every transition that actually happened
    /// emits a notification event; retries stay silent.
    pub fn approve_photo(
        &mut self,
        requester: &Requester,
        photo_id: i64,
        notes: Option<&str>,
    ) -> Result<(Transition, Option<PhotoEvent>)> {
        self.review(requester, photo_id, PhotoStatus::Published, notes)
    }

    pub fn reject_photo(
        &mut self,
        requester: &Requester,
        photo_id: i64,
        notes: Option<&str>,
    ) -> Result<(Transition, Option<PhotoEvent>)> {
        self.review(requester, photo_id, PhotoStatus::Rejected, notes)
    }

    pub fn archive_photo(
        &mut self,
        requester: &Requester,
        photo_id: i64,
    ) -> Result<(Transition, Option<PhotoEvent>)> {
        self.review(requester, photo_id, PhotoStatus::Archived, None)
    }

    fn review(
        &mut self,
        requester: &Requester,
        photo_id: i64,
        to: PhotoStatus,
        notes: Option<&str>,
    ) -> Result<(Transition, Option<PhotoEvent>)> {
        let photo = self.store.get_photo(photo_id)?;
        let session = self.store.get_session(photo.session_id)?;
        ensure_owner_or_admin(requester, &session)?;

        let reviewer = match requester {
            Requester::User { id, .. } => Some(id.as_str()),
            Requester::Anonymous => None,
        };
        let transition = self.store.transition_photo(photo_id, to, reviewer, notes)?;
        // Rejections and archivals notify too: the fan-out layer has to
        // withdraw the photo from viewers, not just announce publishes.
        let event = transition
            .changed
            .then(|| PhotoEvent::from_photo(&transition.photo));
        Ok((transition, event))
    }

    /// Remove a photo, its counters contribution and its blobs.
    pub fn delete_photo(&mut self, requester: &Requester, photo_id: i64) -> Result<Photo> {
        let photo = self.store.get_photo(photo_id)?;
        let session = self.store.get_session(photo.session_id)?;
        ensure_owner_or_admin(requester, &session)?;

        let (photo, paths) = self.store.delete_photo(photo_id)?;
        remove_blobs(&self.blobs, &paths);
        Ok(photo)
    }

    pub fn photo(&self, id: i64) -> Result<Photo> {
        self.store.get_photo(id)
    }

    pub fn photos(&self, session_id: i64) -> Result<Vec<Photo>> {
        self.store.photos_for_session(session_id)
    }

    // ---- Maintenance ----

    /// Recompute every session's counters from its photo rows. Returns how
    /// many sessions needed correction.
    pub fn reconcile_counters(&mut self) -> Result<usize> {
        self.store.reconcile_counters()
    }

    /// Delete media files no photo row references. Returns the removed
    /// paths, relative to the media root.
    pub fn sweep_orphans(&mut self) -> Result<Vec<PathBuf>> {
        let referenced = self.store.all_variant_paths()?;
        let root = self.blobs.root().to_path_buf();
        let mut removed = Vec::new();
        for entry in walkdir::WalkDir::new(&root) {
            let entry = entry.map_err(|e| Error::Storage {
                path: root.display().to_string(),
                detail: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            if !referenced.contains(&rel) {
                std::fs::remove_file(entry.path())?;
                removed.push(PathBuf::from(rel));
            }
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "orphaned media removed");
        }
        Ok(removed)
    }
}

fn ensure_owner_or_admin(requester: &Requester, session: &Session) -> Result<()> {
    match requester {
        Requester::User { id, admin } if *admin || *id == session.owner => Ok(()),
        _ => Err(Error::AccessDenied("owner or admin required")),
    }
}
