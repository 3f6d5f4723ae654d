mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shootshare_core::domain::{Requester, SessionStatus};
use shootshare_core::pipeline::IngestConfig;
use shootshare_core::Gallery;

/// ShootShare — photo session sharing engine
#[derive(Parser)]
#[command(name = "shootshare", version, about)]
struct Cli {
    /// Path to the gallery data directory
    #[arg(long, default_value_t = default_data_dir())]
    data_dir: String,

    /// Ingestion config file (defaults to <data-dir>/config.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Act as this user id (omit for anonymous)
    #[arg(long = "as", global = true)]
    user: Option<String>,

    /// Act with admin privileges (requires --as)
    #[arg(long, global = true)]
    admin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage sessions: create, list, or change status
    Sessions {
        #[command(subcommand)]
        action: Option<SessionsAction>,
    },
    /// Upload photos into a session
    Ingest {
        /// Target session id
        session: i64,
        /// Photo files to upload
        files: Vec<PathBuf>,
        /// Access code, for non-owner uploads
        #[arg(long)]
        code: Option<String>,
    },
    /// Review pending photos: approve, reject, or archive
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },
    /// Check or audit gallery access
    Access {
        #[command(subcommand)]
        action: AccessAction,
    },
    /// Show a session's counters and photos
    Status {
        /// Session id
        session: i64,
        /// Show the full photo table
        #[arg(long)]
        photos: bool,
    },
    /// Recompute session counters from photo rows
    Reconcile,
    /// Delete media files no photo references
    Sweep,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// Create a new session
    Create {
        /// Display name
        name: String,
        /// Make the gallery publicly viewable
        #[arg(long)]
        public: bool,
        /// Access code for private viewing
        #[arg(long)]
        code: Option<String>,
        /// Hold uploads for review instead of instant publish
        #[arg(long)]
        review: bool,
        /// Watermark text for derived resolutions
        #[arg(long)]
        watermark: Option<String>,
    },
    /// Change a session's status
    SetStatus {
        /// Session id
        session: i64,
        /// One of: active, paused, ended, archived
        status: String,
    },
    /// Delete a session
    Delete {
        /// Session id
        session: i64,
        /// Also delete its photos and media
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand)]
enum ReviewAction {
    /// List photos awaiting review
    Pending {
        /// Session id
        session: i64,
    },
    /// Publish a pending photo
    Approve {
        /// Photo id
        photo: i64,
        /// Review notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Reject a pending photo
    Reject {
        /// Photo id
        photo: i64,
        /// Review notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Archive a published or rejected photo
    Archive {
        /// Photo id
        photo: i64,
    },
}

#[derive(Subcommand)]
enum AccessAction {
    /// Run an access check against a session
    Check {
        /// Session id
        session: i64,
        /// Access code to present
        #[arg(long)]
        code: Option<String>,
    },
    /// Show the audited access attempts for a session
    Log {
        /// Session id
        session: i64,
    },
}

fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".shootshare")
        .to_string_lossy()
        .to_string()
}

fn parse_status(s: &str) -> Result<SessionStatus> {
    match s {
        "active" | "paused" | "ended" | "archived" => Ok(SessionStatus::parse(s)),
        other => Err(anyhow::anyhow!("unknown session status: {other}")),
    }
}

/// Load the ingestion config: the explicit `--config` file, else
/// `config.toml` in the data dir, else the built-in defaults.
fn load_config(data_dir: &Path, explicit: Option<&Path>) -> Result<IngestConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let candidate = data_dir.join("config.toml");
            candidate.exists().then_some(candidate)
        }
    };
    match path {
        Some(p) => {
            let raw = std::fs::read_to_string(&p)
                .with_context(|| format!("reading config file {}", p.display()))?;
            toml::from_str(&raw).with_context(|| format!("parsing config file {}", p.display()))
        }
        None => Ok(IngestConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = PathBuf::from(&cli.data_dir);
    let config = load_config(&data_dir, cli.config.as_deref())?;
    let mut gallery = Gallery::open_with_config(&data_dir, config)?;
    let requester = match &cli.user {
        Some(id) => Requester::User {
            id: id.clone(),
            admin: cli.admin,
        },
        None => Requester::Anonymous,
    };

    match cli.command {
        Commands::Sessions { action } => match action {
            None => commands::sessions::list(&gallery)?,
            Some(SessionsAction::Create {
                name,
                public,
                code,
                review,
                watermark,
            }) => commands::sessions::create(
                &gallery, &requester, &name, public, code, review, watermark,
            )?,
            Some(SessionsAction::SetStatus { session, status }) => {
                let status = parse_status(&status)?;
                commands::sessions::set_status(&mut gallery, &requester, session, status)?
            }
            Some(SessionsAction::Delete { session, cascade }) => {
                commands::sessions::delete(&mut gallery, &requester, session, cascade)?
            }
        },
        Commands::Ingest {
            session,
            files,
            code,
        } => commands::ingest::run(&mut gallery, &requester, session, &files, code.as_deref())?,
        Commands::Review { action } => match action {
            ReviewAction::Pending { session } => commands::review::pending(&gallery, session)?,
            ReviewAction::Approve { photo, notes } => {
                commands::review::approve(&mut gallery, &requester, photo, notes.as_deref())?
            }
            ReviewAction::Reject { photo, notes } => {
                commands::review::reject(&mut gallery, &requester, photo, notes.as_deref())?
            }
            ReviewAction::Archive { photo } => {
                commands::review::archive(&mut gallery, &requester, photo)?
            }
        },
        Commands::Access { action } => match action {
            AccessAction::Check { session, code } => {
                commands::access::check(&gallery, &requester, session, code.as_deref())?
            }
            AccessAction::Log { session } => commands::access::log(&gallery, session)?,
        },
        Commands::Status { session, photos } => {
            commands::status::run(&gallery, session, photos)?
        }
        Commands::Reconcile => commands::maintenance::reconcile(&mut gallery)?,
        Commands::Sweep => commands::maintenance::sweep(&mut gallery)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_defaults_when_nothing_present() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.presets.len(), 3);
    }

    #[test]
    fn test_load_config_partial_override_from_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "max_file_size = 1048576\nprocessing_budget_ms = 5000\n",
        )
        .unwrap();

        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.max_file_size, 1_048_576);
        assert_eq!(config.processing_budget_ms, 5000);
        // Untouched knobs keep their defaults.
        assert_eq!(config.presets.len(), 3);
        assert!(config.allowed_extensions.contains("jpg"));
    }

    #[test]
    fn test_load_config_explicit_path_wins() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "max_file_size = 1\n").unwrap();
        let other = tmp.path().join("override.toml");
        std::fs::write(&other, "max_file_size = 2\n").unwrap();

        let config = load_config(tmp.path(), Some(&other)).unwrap();
        assert_eq!(config.max_file_size, 2);
    }

    #[test]
    fn test_load_config_rejects_malformed_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "max_file_size = \"plenty\"\n").unwrap();
        assert!(load_config(tmp.path(), Some(&path)).is_err());
    }
}
