use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::config::{PipelineConfig, Roster};
use crate::table::Table;

const JOIN_KEYS: [&str; 2] = ["match_id", "player_name"];
const RIGHT_SUFFIX: &str = "_adv";
const DROPPED_COLUMN: &str = "scraped_at_adv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub output_path: PathBuf,
    pub basic_rows: usize,
    pub advanced_rows: usize,
    pub merged_rows: usize,
    pub war_covered: usize,
}

/// Left-join advanced stats onto basic stats by `(match_id, player_name)`,
/// keeping roster players only.
///
/// Right-side columns that collide with a left-side name get an `_adv` suffix;
/// the advanced capture timestamp is dropped. Left row order is preserved and
/// the first advanced row per key wins, so the output never has more rows than
/// the (filtered) left side.
pub fn merge_tables(basic: &Table, advanced: &Table, roster: &Roster) -> Result<Table> {
    let left_keys = key_columns(basic, "basic")?;
    let right_keys = key_columns(advanced, "advanced")?;

    let mut headers = basic.headers.clone();
    let mut right_cols = Vec::new();
    for (idx, name) in advanced.headers.iter().enumerate() {
        if right_keys.contains(&idx) {
            continue;
        }
        let out_name = if basic.headers.contains(name) {
            format!("{name}{RIGHT_SUFFIX}")
        } else {
            name.clone()
        };
        if out_name == DROPPED_COLUMN {
            continue;
        }
        headers.push(out_name);
        right_cols.push(idx);
    }

    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut duplicates = 0usize;
    for row in 0..advanced.len() {
        let Some(key) = row_key(advanced, row, right_keys) else {
            continue;
        };
        if index.contains_key(&key) {
            duplicates += 1;
        } else {
            index.insert(key, row);
        }
    }
    if duplicates > 0 {
        warn!(duplicates, "advanced stats carry repeated keys; first row kept");
    }

    let mut out = Table::new(headers);
    for row in 0..basic.len() {
        let Some(player) = basic.cell(row, left_keys[1]) else {
            continue;
        };
        if !roster.contains(player) {
            continue;
        }
        let mut cells = basic.rows[row].clone();
        cells.resize(basic.headers.len(), String::new());
        let matched = row_key(basic, row, left_keys).and_then(|key| index.get(&key).copied());
        for &col in &right_cols {
            let value = matched
                .and_then(|r| advanced.rows[r].get(col))
                .cloned()
                .unwrap_or_default();
            cells.push(value);
        }
        out.push_row(cells);
    }
    Ok(out)
}

/// Merge the two raw tables on disk and overwrite the merged table.
///
/// Fails without writing anything when either raw table is missing.
pub fn merge_stats(config: &PipelineConfig) -> Result<MergeSummary> {
    info!("starting merge");
    let basic_path = config.basic_stats_path();
    let advanced_path = config.advanced_stats_path();
    if !basic_path.exists() {
        return Err(anyhow!(
            "basic stats file not found: {}",
            basic_path.display()
        ));
    }
    if !advanced_path.exists() {
        return Err(anyhow!(
            "advanced stats file not found: {}",
            advanced_path.display()
        ));
    }

    let basic = Table::read_csv(&basic_path)?;
    let advanced = Table::read_csv(&advanced_path)?;
    info!(
        basic = basic.len(),
        advanced = advanced.len(),
        "loaded stat records"
    );

    let merged = merge_tables(&basic, &advanced, &config.roster)?;
    let output_path = config.merged_stats_path();
    merged.write_csv_atomic(&output_path)?;

    let war_covered = merged
        .column("war")
        .map(|col| (0..merged.len()).filter(|&r| merged.cell(r, col).is_some()).count())
        .unwrap_or(0);
    info!(
        rows = merged.len(),
        path = %output_path.display(),
        "merged records written"
    );
    info!("advanced stats coverage: {}/{} records", war_covered, merged.len());

    Ok(MergeSummary {
        output_path,
        basic_rows: basic.len(),
        advanced_rows: advanced.len(),
        merged_rows: merged.len(),
        war_covered,
    })
}

fn key_columns(table: &Table, side: &str) -> Result<[usize; 2]> {
    let mut out = [0usize; 2];
    for (slot, name) in out.iter_mut().zip(JOIN_KEYS) {
        *slot = table
            .column(name)
            .ok_or_else(|| anyhow!("{side} stats missing join column `{name}`"))?;
    }
    Ok(out)
}

fn row_key(table: &Table, row: usize, cols: [usize; 2]) -> Option<(&str, &str)> {
    Some((table.cell(row, cols[0])?, table.cell(row, cols[1])?))
}
