use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::http_client::{fetch_text, http_client};
use crate::records::GameRecord;
use crate::table::round_to;

pub fn fetch_club_stats(config: &PipelineConfig) -> Result<Value> {
    let client = http_client()?;
    let endpoint = config.club_stats_url();
    info!(url = %endpoint.to_url()?, "fetching club data");
    let body = fetch_text(client, &endpoint, &[]).context("club stats request failed")?;
    parse_club_stats_json(&body)
}

/// Parse a club stats body. An empty, `null` or `{}` payload means the fetch
/// failed and is an error.
pub fn parse_club_stats_json(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("failed to fetch club data: empty response"));
    }
    let value: Value = serde_json::from_str(trimmed).context("invalid club stats json")?;
    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(anyhow!("failed to fetch club data: empty payload"));
    }
    Ok(value)
}

fn recent_games(data: &Value) -> &[Value] {
    data.get("recentGames")
        .and_then(|v| v.get("RegularSeason"))
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Regular-season match ids in payload order.
pub fn match_ids(data: &Value) -> Vec<String> {
    let ids = recent_games(data)
        .iter()
        .filter_map(|g| g.get("matchId").and_then(as_string_any))
        .collect::<Vec<_>>();
    info!(count = ids.len(), "found recent games");
    ids
}

/// Per-player records for every recent game, club players only.
pub fn game_records(data: &Value, club_id: &str, scraped_at: &str) -> Vec<GameRecord> {
    let mut out = Vec::new();
    for game in recent_games(data) {
        let rows = extract_player_game_stats(game, club_id, scraped_at);
        debug!(
            match_id = game.get("matchId").and_then(as_string_any).as_deref().unwrap_or("?"),
            players = rows.len(),
            "extracted game"
        );
        out.extend(rows);
    }
    out
}

pub fn extract_player_game_stats(game: &Value, club_id: &str, scraped_at: &str) -> Vec<GameRecord> {
    let Some(match_id) = game.get("matchId").and_then(as_string_any) else {
        return Vec::new();
    };
    let timestamp = game.get("timestamp").and_then(as_i64_any);
    let Some(players) = game
        .get("players")
        .and_then(|p| p.get(club_id))
        .and_then(|p| p.as_object())
    else {
        return Vec::new();
    };

    players
        .iter()
        .map(|(player_id, stats)| {
            let int = |key: &str| stats.get(key).and_then(as_i64_any);
            let float = |key: &str| stats.get(key).and_then(as_f64_any);
            let text = |key: &str| stats.get(key).and_then(as_string_any);

            let goals = int("skgoals");
            let assists = int("skassists");
            let toi_seconds = int("toiseconds");
            let possession_seconds = int("skpossession");

            let mut r = GameRecord::new(match_id.clone(), player_id.clone());
            r.timestamp = timestamp;
            r.scraped_at = scraped_at.to_string();
            r.player_name = text("playername");
            r.position = text("position");
            r.player_class = text("class");
            r.result = int("result");
            r.score = int("score");
            r.opponent_score = int("opponentScore");
            r.opponent_club_id = text("opponentClubId");
            r.toi_seconds = toi_seconds;
            r.toi_minutes = toi_seconds.map(|s| round_to(s as f64 / 60.0, 2));
            r.rating_offense = float("ratingOffense");
            r.rating_defense = float("ratingDefense");
            r.rating_teamplay = float("ratingTeamplay");
            r.goals = goals;
            r.assists = assists;
            r.points = Some(goals.unwrap_or(0) + assists.unwrap_or(0));
            r.gwg = int("skgwg");
            r.ppg = int("skppg");
            r.shg = int("skshg");
            r.plus_minus = int("skplusmin");
            r.shots = int("skshots");
            r.shot_attempts = int("skshotattempts");
            r.shot_pct = float("skshotpct");
            r.shot_on_net_pct = float("skshotonnetpct");
            r.deflections = int("skdeflections");
            r.passes = int("skpasses");
            r.pass_attempts = int("skpassattempts");
            r.pass_pct = float("skpasspct");
            r.saucer_passes = int("sksaucerpasses");
            r.possession_seconds = possession_seconds;
            r.possession_minutes = possession_seconds.map(|s| round_to(s as f64 / 60.0, 2));
            r.faceoff_wins = int("skfow");
            r.faceoff_losses = int("skfol");
            r.faceoff_pct = float("skfopct");
            r.hits = int("skhits");
            r.blocked_shots = int("skbs");
            r.interceptions = int("skinterceptions");
            r.takeaways = int("sktakeaways");
            r.giveaways = int("skgiveaways");
            r.pk_clear_zone = int("skpkclearzone");
            r.pim = int("skpim");
            r.penalties_drawn = int("skpenaltiesdrawn");
            r.goalie_saves = int("glsaves");
            r.goalie_shots_against = int("glshots");
            r.goalie_goals_against = int("glga");
            r.goalie_save_pct = float("glsavepct");
            r.goalie_gaa = float("glgaa");
            r.goalie_shutout_periods = int("glsoperiods");
            r
        })
        .collect()
}

pub(crate) fn as_string_any(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = as_f64_any(v)
        && f.fract() == 0.0
    {
        return Some(f as i64);
    }
    None
}

pub(crate) fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}
