use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{info, warn};

use crate::club_api::{as_i64_any, as_string_any};
use crate::config::PipelineConfig;
use crate::http_client::{fetch_text, http_client};
use crate::table::{Table, fmt_float, round_to, write_atomic};

pub const ICE_ZONES: usize = 16;
pub const NET_LOCATIONS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneCounts {
    pub goals: u64,
    pub shots: u64,
}

impl ZoneCounts {
    /// Goals per shot in percent, zero without shots.
    pub fn efficiency(&self) -> f64 {
        if self.shots == 0 {
            return 0.0;
        }
        self.goals as f64 / self.shots as f64 * 100.0
    }
}

/// Career shot and goal counts for one club member.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotProfile {
    pub player_name: String,
    pub games_played: u64,
    pub favorite_position: String,
    pub on_ice: [ZoneCounts; ICE_ZONES],
    pub on_net: [ZoneCounts; NET_LOCATIONS],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShotSnapshot {
    pub output_path: PathBuf,
    pub players: usize,
    pub skipped: Vec<String>,
}

pub fn fetch_members_stats(config: &PipelineConfig) -> Result<String> {
    let client = http_client()?;
    let endpoint = config.members_stats_url();
    info!(url = %endpoint.to_url()?, "fetching members stats");
    fetch_text(
        client,
        &endpoint,
        &[("Accept", "application/json"), ("Referer", "https://www.ea.com/")],
    )
    .context("members stats request failed")
}

/// Download the club members' career stats and keep the raw JSON.
///
/// Returns the number of members in the payload.
pub fn capture_members_stats(config: &PipelineConfig) -> Result<usize> {
    let body = fetch_members_stats(config)?;
    save_members_json(&config.members_stats_path(), &body)
}

/// Validate and pretty-print a members payload to `path`.
pub fn save_members_json(path: &Path, raw: &str) -> Result<usize> {
    let value: Value = serde_json::from_str(raw.trim()).context("invalid members stats json")?;
    let members = value
        .get("members")
        .and_then(|m| m.as_array())
        .map(Vec::len)
        .ok_or_else(|| anyhow!("members stats json has no `members` list"))?;
    let pretty = serde_json::to_string_pretty(&value).context("serialize members stats")?;
    write_atomic(path, |tmp| {
        fs::write(tmp, pretty.as_bytes()).with_context(|| format!("write {}", tmp.display()))
    })?;
    info!(members, path = %path.display(), "members stats saved");
    Ok(members)
}

/// Turn a members payload into profiles. Members without games are left out
/// and returned by name in the second list.
pub fn parse_members(raw: &str) -> Result<(Vec<ShotProfile>, Vec<String>)> {
    let value: Value = serde_json::from_str(raw.trim()).context("invalid members stats json")?;
    let members = value
        .get("members")
        .and_then(|m| m.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut profiles = Vec::new();
    let mut skipped = Vec::new();
    for member in members {
        let player_name = member
            .get("name")
            .and_then(as_string_any)
            .unwrap_or_default();
        let games_played = count(member, "gp");
        info!("processing {player_name}: {games_played} games");
        if games_played == 0 {
            warn!("skipping {player_name} - 0 games played");
            skipped.push(player_name);
            continue;
        }

        let mut on_ice = [ZoneCounts::default(); ICE_ZONES];
        for (i, zone) in on_ice.iter_mut().enumerate() {
            zone.goals = count(member, &format!("GoalsLocationOnIce{}", i + 1));
            zone.shots = count(member, &format!("ShotsLocationOnIce{}", i + 1));
        }
        let mut on_net = [ZoneCounts::default(); NET_LOCATIONS];
        for (i, loc) in on_net.iter_mut().enumerate() {
            loc.goals = count(member, &format!("GoalsLocationOnNet{}", i + 1));
            loc.shots = count(member, &format!("ShotsLocationOnNet{}", i + 1));
        }

        profiles.push(ShotProfile {
            player_name,
            games_played,
            favorite_position: member
                .get("favoritePosition")
                .and_then(as_string_any)
                .unwrap_or_default(),
            on_ice,
            on_net,
        });
    }
    Ok((profiles, skipped))
}

pub fn snapshot_headers() -> Vec<String> {
    let mut headers = vec![
        "player_name".to_string(),
        "games_played".to_string(),
        "favorite_position".to_string(),
    ];
    for (kind, n) in [("zone", ICE_ZONES), ("net", NET_LOCATIONS)] {
        for i in 1..=n {
            headers.push(format!("goals_{kind}_{i}"));
            headers.push(format!("goals_{kind}_{i}_per_game"));
            headers.push(format!("shots_{kind}_{i}"));
            headers.push(format!("shots_{kind}_{i}_per_game"));
            headers.push(format!("efficiency_{kind}_{i}"));
        }
    }
    headers
}

/// One row per profile.
///
/// With `swap_zone_goals` the `goals_zone_5` and `goals_zone_6` cells trade
/// places after every derived value has been computed from the unswapped
/// counts. Nothing else moves.
pub fn snapshot_table(profiles: &[ShotProfile], swap_zone_goals: bool) -> Table {
    let mut table = Table::new(snapshot_headers());
    let swap_cols = (table.column("goals_zone_5"), table.column("goals_zone_6"));
    for p in profiles {
        let gp = p.games_played as f64;
        let mut row = vec![
            p.player_name.clone(),
            p.games_played.to_string(),
            p.favorite_position.clone(),
        ];
        for zone in p.on_ice.iter().chain(p.on_net.iter()) {
            row.push(zone.goals.to_string());
            row.push(fmt_float(round_to(zone.goals as f64 / gp, 2)));
            row.push(zone.shots.to_string());
            row.push(fmt_float(round_to(zone.shots as f64 / gp, 2)));
            row.push(fmt_float(round_to(zone.efficiency(), 1)));
        }
        if swap_zone_goals && let (Some(a), Some(b)) = swap_cols {
            row.swap(a, b);
        }
        table.push_row(row);
    }
    table
}

/// Rebuild the snapshot table from the last captured members payload.
pub fn process_shot_locations(config: &PipelineConfig) -> Result<ShotSnapshot> {
    let source = config.members_stats_path();
    info!(path = %source.display(), "loading shot location data");
    if !source.exists() {
        return Err(anyhow!(
            "{} not found - capture members stats first",
            source.display()
        ));
    }
    let raw = fs::read_to_string(&source)
        .with_context(|| format!("read {}", source.display()))?;
    let (profiles, skipped) = parse_members(&raw)?;
    if profiles.is_empty() {
        return Err(anyhow!("no members with games played in {}", source.display()));
    }

    if config.swap_zone_goals {
        info!("exchanging goals_zone_5 and goals_zone_6 columns");
    }
    let table = snapshot_table(&profiles, config.swap_zone_goals);
    let output_path = config.shot_locations_path();
    table.write_csv_atomic(&output_path)?;
    info!(
        players = table.len(),
        path = %output_path.display(),
        "saved shot location data"
    );

    Ok(ShotSnapshot {
        output_path,
        players: table.len(),
        skipped,
    })
}

fn count(member: &Value, key: &str) -> u64 {
    member
        .get(key)
        .and_then(as_i64_any)
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}
