use anyhow::Result;

use chel_pipeline::{cli, run_log};

fn main() -> Result<()> {
    let config = cli::load_config();
    let limit = std::env::var("CHEL_HISTORY_LIMIT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(10)
        .clamp(1, 200);

    let conn = run_log::open_db(&config.run_log_path())?;
    let runs = run_log::recent_runs(&conn, limit)?;
    if runs.is_empty() {
        println!("No runs recorded in {}", config.run_log_path().display());
        return Ok(());
    }
    for run in runs {
        println!(
            "#{} {} {} new={} merged={} validation={}",
            run.run_id,
            run.started_at,
            if run.succeeded { "OK " } else { "ERR" },
            run.new_matches,
            run.merged_rows,
            run.validation
        );
        for err in run.errors.iter().take(4) {
            println!("   - {err}");
        }
    }
    Ok(())
}
