use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_TEAM_NAME: &str = "Dutchess Dairyboys";
pub const DEFAULT_CONSOLE: &str = "common-gen5";
pub const DEFAULT_CLUB_ID: &str = "58805";
pub const DEFAULT_API_BASE_URL: &str = "https://chelstats.app/api";
pub const DEFAULT_ROSTER: &[&str] = &[
    "MrBazzzz",
    "Mcapp_1",
    "TwoInchTommy565",
    "NYKings06",
    "Slick__AV",
];

const CHELSTATS_GAMES_URL: &str = "https://chelstats.app/clubs/recent-games";
const PROCLUBS_MEMBERS_URL: &str = "https://proclubs.ea.com/api/nhl/members/stats";
const DEFAULT_SETTLE_DELAY_MS: u64 = 4000;

/// The tracked players. Only these names survive the merge and get
/// advanced-stats extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        Self { names: out }
    }

    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split([',', ';']))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(DEFAULT_ROSTER.iter().copied())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub team_name: String,
    pub console: String,
    pub club_id: String,
    pub roster: Roster,
    pub api_base_url: String,
    pub settle_delay: Duration,
    pub swap_zone_goals: bool,
    pub log_level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
            team_name: DEFAULT_TEAM_NAME.to_string(),
            console: DEFAULT_CONSOLE.to_string(),
            club_id: DEFAULT_CLUB_ID.to_string(),
            roster: Roster::default(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            swap_zone_goals: true,
            log_level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(dir) = env_non_empty("CHEL_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_non_empty("CHEL_LOG_DIR") {
            cfg.log_dir = PathBuf::from(dir);
        }
        if let Some(name) = env_non_empty("CHEL_TEAM_NAME") {
            cfg.team_name = name;
        }
        if let Some(console) = env_non_empty("CHEL_CONSOLE") {
            cfg.console = console;
        }
        if let Some(club_id) = env_non_empty("CHEL_CLUB_ID") {
            cfg.club_id = club_id;
        }
        if let Some(raw) = env_non_empty("CHEL_ROSTER") {
            let roster = Roster::parse(&raw);
            if !roster.is_empty() {
                cfg.roster = roster;
            }
        }
        if let Some(url) = env_non_empty("CHEL_API_BASE_URL") {
            cfg.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ms) = env_non_empty("CHEL_SETTLE_DELAY_MS").and_then(|v| v.parse::<u64>().ok())
        {
            cfg.settle_delay = Duration::from_millis(ms);
        }
        if let Some(raw) = env_non_empty("CHEL_SWAP_ZONE_GOALS") {
            cfg.swap_zone_goals = parse_flag(&raw);
        }
        if let Some(level) = env_non_empty("CHEL_LOG_LEVEL") {
            cfg.log_level = level;
        }
        cfg
    }

    /// Config rooted at `data_dir`, everything else default. Used by tests
    /// and the single-stage binaries.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn basic_stats_path(&self) -> PathBuf {
        self.raw_dir().join("basic_stats.csv")
    }

    pub fn advanced_stats_path(&self) -> PathBuf {
        self.raw_dir().join("advanced_stats.csv")
    }

    pub fn members_stats_path(&self) -> PathBuf {
        self.raw_dir().join("proclubs_members_stats.json")
    }

    pub fn merged_stats_path(&self) -> PathBuf {
        self.processed_dir().join("merged_stats.csv")
    }

    pub fn shot_locations_path(&self) -> PathBuf {
        self.processed_dir().join("shot_locations.csv")
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.data_dir.join("pipeline_runs.sqlite")
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir.join("pipeline.log")
    }

    pub fn club_stats_url(&self) -> Endpoint {
        Endpoint::new(format!("{}/clubs/stats", self.api_base_url))
            .param("teamname", &self.team_name)
            .param("console", &self.console)
            .param("strict", "false")
    }

    pub fn game_url(&self, match_id: &str) -> Endpoint {
        Endpoint::new(CHELSTATS_GAMES_URL)
            .param("teamname", &self.team_name)
            .param("console", &self.console)
            .param("gameType", "RegularSeason")
            .param("matchId", match_id)
    }

    pub fn members_stats_url(&self) -> Endpoint {
        Endpoint::new(PROCLUBS_MEMBERS_URL)
            .param("platform", &self.console)
            .param("clubId", &self.club_id)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.raw_dir(), self.processed_dir(), self.log_dir.clone()] {
            create_dir(&dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))
}

fn env_non_empty(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Base URL plus unencoded query pairs. The HTTP client does the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base: String,
    pub query: Vec<(&'static str, String)>,
}

impl Endpoint {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Fully encoded URL, as sent.
    pub fn to_url(&self) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(&self.base, &self.query)
            .with_context(|| format!("invalid url {}", self.base))
    }
}
