use anyhow::Result;

use chel_pipeline::{cli, logging, merge};

fn main() -> Result<()> {
    let config = cli::load_config();
    logging::init(&config)?;

    let summary = merge::merge_stats(&config)?;
    println!("Merge complete");
    println!("Output: {}", summary.output_path.display());
    println!(
        "Rows: basic={} advanced={} merged={}",
        summary.basic_rows, summary.advanced_rows, summary.merged_rows
    );
    println!(
        "Advanced coverage: {}/{}",
        summary.war_covered, summary.merged_rows
    );
    Ok(())
}
