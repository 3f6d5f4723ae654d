use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use shootshare_core::domain::{PhotoStatus, Requester};
use shootshare_core::Gallery;

pub fn pending(gallery: &Gallery, session_id: i64) -> Result<()> {
    let photos = gallery.photos(session_id)?;
    let pending: Vec<_> = photos
        .iter()
        .filter(|p| p.status == PhotoStatus::Pending)
        .collect();
    if pending.is_empty() {
        println!("No photos awaiting review in session {session_id}.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Name", "Size", "Dimensions", "Uploader"]);
    for photo in pending {
        table.add_row(vec![
            photo.id.to_string(),
            photo.original_name.clone(),
            format!("{} KiB", photo.size / 1024),
            format!("{}x{}", photo.width, photo.height),
            photo.uploader.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn approve(
    gallery: &mut Gallery,
    requester: &Requester,
    photo_id: i64,
    notes: Option<&str>,
) -> Result<()> {
    let (transition, event) = gallery.approve_photo(requester, photo_id, notes)?;
    if transition.changed {
        println!("Published photo {photo_id}");
    } else {
        println!("Photo {photo_id} was already published");
    }
    if event.is_some() {
        println!("Notification queued for session viewers");
    }
    Ok(())
}

pub fn reject(
    gallery: &mut Gallery,
    requester: &Requester,
    photo_id: i64,
    notes: Option<&str>,
) -> Result<()> {
    let (transition, _) = gallery.reject_photo(requester, photo_id, notes)?;
    if transition.changed {
        println!("Rejected photo {photo_id}");
    } else {
        println!("Photo {photo_id} was already rejected");
    }
    Ok(())
}

pub fn archive(gallery: &mut Gallery, requester: &Requester, photo_id: i64) -> Result<()> {
    let (transition, _) = gallery.archive_photo(requester, photo_id)?;
    if transition.changed {
        println!("Archived photo {photo_id}");
    } else {
        println!("Photo {photo_id} was already archived");
    }
    Ok(())
}
