use anyhow::{bail, Result};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use shootshare_core::domain::{Requester, SessionStatus, Visibility, WatermarkSettings};
use shootshare_core::Gallery;

pub fn list(gallery: &Gallery) -> Result<()> {
    let sessions = gallery.sessions()?;
    if sessions.is_empty() {
        println!("No sessions yet. Create one with `shootshare sessions create`.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "ID", "Name", "Owner", "Visibility", "Status", "Photos", "Views",
        ]);
    for session in &sessions {
        table.add_row(vec![
            session.id.to_string(),
            session.name.clone(),
            session.owner.clone(),
            session.visibility.as_str().to_string(),
            session.status.as_str().to_string(),
            session.counters.total.to_string(),
            session.view_count.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn create(
    gallery: &Gallery,
    requester: &Requester,
    name: &str,
    public: bool,
    code: Option<String>,
    review: bool,
    watermark: Option<String>,
) -> Result<()> {
    let Requester::User { id: owner, .. } = requester else {
        bail!("creating a session requires --as <user>");
    };

    let visibility = if public {
        Visibility::Public
    } else {
        Visibility::Private
    };
    let watermark = watermark.map(|text| WatermarkSettings {
        enabled: true,
        text,
        opacity: 0.0, // picks up the configured default
    });

    let session = gallery.create_session(owner, name, visibility, code, Some(review), watermark)?;
    println!("Created session {} ({})", session.id, session.name);
    if let Some(code) = &session.access_code {
        println!("Access code: {code}");
    }
    Ok(())
}

pub fn set_status(
    gallery: &mut Gallery,
    requester: &Requester,
    session_id: i64,
    status: SessionStatus,
) -> Result<()> {
    gallery.set_session_status(requester, session_id, status)?;
    println!("Session {} is now {}", session_id, status.as_str());
    Ok(())
}

pub fn delete(
    gallery: &mut Gallery,
    requester: &Requester,
    session_id: i64,
    cascade: bool,
) -> Result<()> {
    let session = gallery.delete_session(requester, session_id, cascade)?;
    println!(
        "Deleted session {} ({} photos removed)",
        session.name, session.counters.total
    );
    Ok(())
}
