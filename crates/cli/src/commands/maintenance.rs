use anyhow::Result;
use shootshare_core::Gallery;

pub fn reconcile(gallery: &mut Gallery) -> Result<()> {
    let corrected = gallery.reconcile_counters()?;
    if corrected == 0 {
        println!("All session counters are consistent.");
    } else {
        println!("Corrected counters on {corrected} session(s).");
    }
    Ok(())
}

pub fn sweep(gallery: &mut Gallery) -> Result<()> {
    let removed = gallery.sweep_orphans()?;
    if removed.is_empty() {
        println!("No orphaned media found.");
    } else {
        println!("Removed {} orphaned file(s):", removed.len());
        for path in &removed {
            println!("  {}", path.display());
        }
    }
    Ok(())
}
