use anyhow::Result;
use chrono::{TimeZone, Utc};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use shootshare_core::domain::Requester;
use shootshare_core::Gallery;

pub fn check(
    gallery: &Gallery,
    requester: &Requester,
    session_id: i64,
    code: Option<&str>,
) -> Result<()> {
    let decision = gallery.check_access(requester, session_id, code, None)?;
    if decision.granted {
        println!("Granted ({})", decision.reason.as_str());
    } else {
        println!("Denied ({})", decision.reason.as_str());
    }
    Ok(())
}

pub fn log(gallery: &Gallery, session_id: i64) -> Result<()> {
    let attempts = gallery.access_log(session_id)?;
    if attempts.is_empty() {
        println!("No audited attempts for session {session_id}.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["When", "Origin", "Code", "Outcome", "Reason"]);
    for attempt in &attempts {
        table.add_row(vec![
            format_ts(attempt.created_at),
            attempt.origin.clone().unwrap_or_else(|| "-".to_string()),
            attempt
                .supplied_code
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            if attempt.granted { "granted" } else { "denied" }.to_string(),
            attempt.reason.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn format_ts(ts: i64) -> String {
    match Utc.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}
