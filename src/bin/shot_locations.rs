use anyhow::Result;

use chel_pipeline::{cli, logging, shot_locations};

fn main() -> Result<()> {
    let config = cli::load_config();
    logging::init(&config)?;
    config.ensure_dirs()?;

    // `--offline` reprocesses the last captured payload without fetching.
    let offline = std::env::args().skip(1).any(|a| a == "--offline");
    if !offline {
        let members = shot_locations::capture_members_stats(&config)?;
        println!("Captured {members} members");
    }

    let snapshot = shot_locations::process_shot_locations(&config)?;
    println!("Shot locations: {}", snapshot.output_path.display());
    println!("Players: {}", snapshot.players);
    if !snapshot.skipped.is_empty() {
        println!("Skipped (no games): {}", snapshot.skipped.join(", "));
    }
    Ok(())
}
