use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A row the incremental store can persist. The key is the record's identity;
/// two rows with equal keys are the same row regardless of their stat values.
pub trait StoreRecord: Serialize + DeserializeOwned {
    fn store_key(&self) -> (String, String);
}

/// One player's line in one game, as delivered by the club stats API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub match_id: String,
    pub timestamp: Option<i64>,
    pub scraped_at: String,
    pub player_name: Option<String>,
    pub player_id: String,
    pub position: Option<String>,
    pub player_class: Option<String>,

    pub result: Option<i64>,
    pub score: Option<i64>,
    pub opponent_score: Option<i64>,
    pub opponent_club_id: Option<String>,

    pub toi_seconds: Option<i64>,
    pub toi_minutes: Option<f64>,

    pub rating_offense: Option<f64>,
    pub rating_defense: Option<f64>,
    pub rating_teamplay: Option<f64>,

    pub goals: Option<i64>,
    pub assists: Option<i64>,
    pub points: Option<i64>,
    pub gwg: Option<i64>,
    pub ppg: Option<i64>,
    pub shg: Option<i64>,
    pub plus_minus: Option<i64>,

    pub shots: Option<i64>,
    pub shot_attempts: Option<i64>,
    pub shot_pct: Option<f64>,
    pub shot_on_net_pct: Option<f64>,
    pub deflections: Option<i64>,

    pub passes: Option<i64>,
    pub pass_attempts: Option<i64>,
    pub pass_pct: Option<f64>,
    pub saucer_passes: Option<i64>,

    pub possession_seconds: Option<i64>,
    pub possession_minutes: Option<f64>,

    pub faceoff_wins: Option<i64>,
    pub faceoff_losses: Option<i64>,
    pub faceoff_pct: Option<f64>,

    pub hits: Option<i64>,
    pub blocked_shots: Option<i64>,
    pub interceptions: Option<i64>,
    pub takeaways: Option<i64>,
    pub giveaways: Option<i64>,
    pub pk_clear_zone: Option<i64>,

    pub pim: Option<i64>,
    pub penalties_drawn: Option<i64>,

    pub goalie_saves: Option<i64>,
    pub goalie_shots_against: Option<i64>,
    pub goalie_goals_against: Option<i64>,
    pub goalie_save_pct: Option<f64>,
    pub goalie_gaa: Option<f64>,
    pub goalie_shutout_periods: Option<i64>,
}

impl GameRecord {
    /// A record with identifiers set and every stat empty.
    pub fn new(match_id: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            timestamp: None,
            scraped_at: String::new(),
            player_name: None,
            player_id: player_id.into(),
            position: None,
            player_class: None,
            result: None,
            score: None,
            opponent_score: None,
            opponent_club_id: None,
            toi_seconds: None,
            toi_minutes: None,
            rating_offense: None,
            rating_defense: None,
            rating_teamplay: None,
            goals: None,
            assists: None,
            points: None,
            gwg: None,
            ppg: None,
            shg: None,
            plus_minus: None,
            shots: None,
            shot_attempts: None,
            shot_pct: None,
            shot_on_net_pct: None,
            deflections: None,
            passes: None,
            pass_attempts: None,
            pass_pct: None,
            saucer_passes: None,
            possession_seconds: None,
            possession_minutes: None,
            faceoff_wins: None,
            faceoff_losses: None,
            faceoff_pct: None,
            hits: None,
            blocked_shots: None,
            interceptions: None,
            takeaways: None,
            giveaways: None,
            pk_clear_zone: None,
            pim: None,
            penalties_drawn: None,
            goalie_saves: None,
            goalie_shots_against: None,
            goalie_goals_against: None,
            goalie_save_pct: None,
            goalie_gaa: None,
            goalie_shutout_periods: None,
        }
    }
}

impl StoreRecord for GameRecord {
    fn store_key(&self) -> (String, String) {
        (
            self.match_id.trim().to_string(),
            self.player_id.trim().to_string(),
        )
    }
}

/// Derived efficiency metrics for one player in one game. A metric is `None`
/// when its label was not on the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub war: Option<f64>,
    pub total_offense: Option<f64>,
    pub total_defense: Option<f64>,
    pub efficiency: Option<f64>,
    pub expected_goals: Option<f64>,
    pub goals_above_expected: Option<f64>,
    pub goals_above_replacement: Option<f64>,
}

impl AdvancedMetrics {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// Flat field list rather than `#[serde(flatten)]`: the csv serializer cannot
// write flattened structs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedStatRecord {
    pub match_id: String,
    pub player_name: String,
    pub war: Option<f64>,
    pub total_offense: Option<f64>,
    pub total_defense: Option<f64>,
    pub efficiency: Option<f64>,
    pub expected_goals: Option<f64>,
    pub goals_above_expected: Option<f64>,
    pub goals_above_replacement: Option<f64>,
    pub scraped_at: String,
}

impl AdvancedStatRecord {
    pub fn from_metrics(
        match_id: impl Into<String>,
        player_name: impl Into<String>,
        metrics: AdvancedMetrics,
        scraped_at: impl Into<String>,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            player_name: player_name.into(),
            war: metrics.war,
            total_offense: metrics.total_offense,
            total_defense: metrics.total_defense,
            efficiency: metrics.efficiency,
            expected_goals: metrics.expected_goals,
            goals_above_expected: metrics.goals_above_expected,
            goals_above_replacement: metrics.goals_above_replacement,
            scraped_at: scraped_at.into(),
        }
    }
}

impl StoreRecord for AdvancedStatRecord {
    fn store_key(&self) -> (String, String) {
        (
            self.match_id.trim().to_string(),
            self.player_name.trim().to_string(),
        )
    }
}

/// Capture timestamp in the local-time ISO form the tables use.
pub fn capture_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
