use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use shootshare_core::domain::PhotoStatus;
use shootshare_core::Gallery;

pub fn run(gallery: &Gallery, session_id: i64, show_photos: bool) -> Result<()> {
    let session = gallery.session(session_id)?;

    println!("Session {} — {}", session.id, session.name);
    println!(
        "  owner: {}  visibility: {}  status: {}",
        session.owner,
        session.visibility.as_str(),
        session.status.as_str()
    );
    if session.review_mode {
        println!("  review mode: uploads await approval");
    }
    if session.watermark.enabled {
        println!(
            "  watermark: \"{}\" at {:.0}% opacity",
            session.watermark.text,
            session.watermark.opacity * 100.0
        );
    }
    println!(
        "  views: {} ({} unique)",
        session.view_count, session.unique_viewers
    );

    let c = &session.counters;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Total", "Pending", "Published", "Rejected", "Archived",
        ]);
    table.add_row(vec![
        Cell::new(c.total),
        Cell::new(c.pending).fg(Color::Yellow),
        Cell::new(c.published).fg(Color::Green),
        Cell::new(c.rejected).fg(Color::Red),
        Cell::new(c.archived),
    ]);
    println!("{table}");

    if !c.is_consistent() {
        println!("  counters are inconsistent, run `shootshare reconcile`");
    }

    if show_photos {
        let photos = gallery.photos(session_id)?;
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["ID", "Name", "Status", "Dimensions", "Variants"]);
        for photo in &photos {
            let status = match photo.status {
                PhotoStatus::Pending => Cell::new("pending").fg(Color::Yellow),
                PhotoStatus::Published => Cell::new("published").fg(Color::Green),
                PhotoStatus::Rejected => Cell::new("rejected").fg(Color::Red),
                PhotoStatus::Archived => Cell::new("archived"),
            };
            table.add_row(vec![
                Cell::new(photo.id),
                Cell::new(&photo.original_name),
                status,
                Cell::new(format!("{}x{}", photo.width, photo.height)),
                Cell::new(photo.variants.len()),
            ]);
        }
        println!("{table}");
    }

    Ok(())
}
