use std::process::ExitCode;

use chel_pipeline::{cli, logging, validate};

fn main() -> ExitCode {
    let config = cli::load_config();
    if let Err(err) = logging::init(&config) {
        eprintln!("error: {err:#}");
    }

    let report = match validate::validate_data(&config.merged_stats_path()) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    println!("Rows checked: {}", report.rows);
    if report.passed() {
        println!("Validation passed");
        return ExitCode::SUCCESS;
    }
    println!("Issues: {}", report.issues.len());
    for issue in &report.issues {
        println!(" - [{:?}] {issue}", issue.severity);
    }
    ExitCode::FAILURE
}
