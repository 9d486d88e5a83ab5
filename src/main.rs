use std::process::ExitCode;

use chel_pipeline::pipeline::Pipeline;
use chel_pipeline::sources::LiveSources;
use chel_pipeline::{cli, logging, run_log};

fn main() -> ExitCode {
    let config = cli::load_config();
    if let Err(err) = logging::init(&config) {
        eprintln!("error: {err:#}");
    }

    let sources = LiveSources::new(&config);
    let mut pipeline = Pipeline::new(config, sources);
    let summary = pipeline.run();

    match run_log::open_db(&pipeline.config().run_log_path())
        .and_then(|conn| run_log::record_run(&conn, &summary))
    {
        Ok(run_id) => tracing::info!(run_id, "run recorded"),
        Err(err) => tracing::warn!("could not record run: {err:#}"),
    }

    println!("Pipeline run finished");
    println!("New games: {}", summary.new_match_ids.len());
    println!(
        "Records appended: basic={} advanced={}",
        summary.basic_appended, summary.advanced_appended
    );
    println!(
        "Merge: {} ({} rows)  Validation: {}",
        summary.merge.as_str(),
        summary.merged_rows,
        summary.validation.as_str()
    );
    for issue in &summary.validation_issues {
        println!("  - {issue}");
    }
    println!(
        "Shot locations: {} ({} players)",
        summary.shot_capture.as_str(),
        summary.shot_players
    );
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(8) {
            println!(" - {err}");
        }
    }

    if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
