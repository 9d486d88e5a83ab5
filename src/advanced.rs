use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, info, warn};

use crate::config::{Endpoint, PipelineConfig, Roster};
use crate::http_client::{fetch_text, http_client};
use crate::records::{AdvancedMetrics, AdvancedStatRecord, capture_timestamp};

const LABEL_SELECTOR: &str = "p.css-9y6e4h";

/// One exclusive browsing session over the stats site's game pages.
///
/// Only one match may be open at a time; `MatchScope` enforces the pairing of
/// `open_match` and `close_match`.
pub trait BrowsingSession {
    fn open_match(&mut self, match_id: &str) -> Result<()>;

    /// Page content with `player_name` selected, or `None` when the game does
    /// not list that player.
    fn select_player(&mut self, player_name: &str) -> Result<Option<String>>;

    fn close_match(&mut self);
}

/// An open match on a session. Dropping it closes the match, also when
/// extraction bailed out halfway.
pub struct MatchScope<'a, S: BrowsingSession + ?Sized> {
    session: &'a mut S,
    match_id: String,
}

impl<'a, S: BrowsingSession + ?Sized> MatchScope<'a, S> {
    pub fn open(session: &'a mut S, match_id: &str) -> Result<Self> {
        session
            .open_match(match_id)
            .with_context(|| format!("open game {match_id}"))?;
        Ok(Self {
            session,
            match_id: match_id.to_string(),
        })
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn select_player(&mut self, player_name: &str) -> Result<Option<String>> {
        self.session.select_player(player_name)
    }
}

impl<S: BrowsingSession + ?Sized> Drop for MatchScope<'_, S> {
    fn drop(&mut self) {
        self.session.close_match();
    }
}

#[derive(Debug, Default)]
pub struct AdvancedBatch {
    pub records: Vec<AdvancedStatRecord>,
    pub errors: Vec<String>,
}

/// Extract advanced stats for each match in order, one match at a time.
///
/// Players missing from a game are skipped quietly; a failing player or match
/// is recorded in `errors` and the next one is tried.
pub fn scrape_advanced_stats<S: BrowsingSession + ?Sized>(
    session: &mut S,
    match_ids: &[String],
    roster: &Roster,
) -> AdvancedBatch {
    info!(games = match_ids.len(), "starting advanced stats extraction");
    let mut batch = AdvancedBatch::default();
    for match_id in match_ids {
        match scrape_game(session, match_id, roster, &mut batch.errors) {
            Ok(records) => batch.records.extend(records),
            Err(err) => {
                error!("error scraping game {match_id}: {err:#}");
                batch.errors.push(format!("game {match_id}: {err:#}"));
            }
        }
    }
    batch
}

fn scrape_game<S: BrowsingSession + ?Sized>(
    session: &mut S,
    match_id: &str,
    roster: &Roster,
    errors: &mut Vec<String>,
) -> Result<Vec<AdvancedStatRecord>> {
    info!(match_id, "scraping game");
    let mut scope = MatchScope::open(session, match_id)?;
    let mut out = Vec::new();
    for player in roster.names() {
        match scope.select_player(player) {
            Ok(Some(html)) => {
                let metrics = parse_advanced_stats(&html);
                info!(
                    "  {player}: WAR={}",
                    metrics.war.map(|w| format!("{w}%")).unwrap_or_else(|| "N/A".into())
                );
                out.push(AdvancedStatRecord::from_metrics(
                    scope.match_id(),
                    player.as_str(),
                    metrics,
                    capture_timestamp(),
                ));
            }
            Ok(None) => warn!("  {player} not found in game {match_id} (likely didn't play)"),
            Err(err) => {
                error!("  error scraping {player}: {err:#}");
                errors.push(format!("game {match_id} player {player}: {err:#}"));
            }
        }
    }
    Ok(out)
}

/// Read the labelled metrics off a rendered advanced-stats panel.
pub fn parse_advanced_stats(html: &str) -> AdvancedMetrics {
    let doc = Html::parse_document(html);
    let mut stats = AdvancedMetrics::default();
    let Ok(labels) = Selector::parse(LABEL_SELECTOR) else {
        return stats;
    };
    for label in doc.select(&labels) {
        let label_text = element_text(label);
        let Some(value) = label
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "p")
        else {
            continue;
        };
        let value = to_float(&element_text(value));
        let slot = match label_text.as_str() {
            "WAR" => &mut stats.war,
            "TO" => &mut stats.total_offense,
            "TD" => &mut stats.total_defense,
            "Eff" => &mut stats.efficiency,
            "xG" => &mut stats.expected_goals,
            "GAE" => &mut stats.goals_above_expected,
            "GAR" => &mut stats.goals_above_replacement,
            _ => continue,
        };
        *slot = value;
    }
    stats
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn to_float(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(['%', ','], "");
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Session backed by plain page fetches of the stats site's game view.
///
/// Limitation: the live game page renders its advanced-stats panel
/// client-side, and the `player` query parameter used to pick a player is not
/// a documented endpoint. Against the live site this session can come back
/// with pages that carry no labelled metrics, which read as "player not in
/// this game". Extraction that must work end to end needs a
/// `BrowsingSession` that drives a real browser.
pub struct HttpSession {
    client: &'static Client,
    config: PipelineConfig,
    settle_delay: Duration,
    current: Option<Endpoint>,
}

impl HttpSession {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            config: config.clone(),
            settle_delay: config.settle_delay,
            current: None,
        })
    }
}

impl BrowsingSession for HttpSession {
    fn open_match(&mut self, match_id: &str) -> Result<()> {
        if let Some(open) = &self.current {
            let open = open.get("matchId").unwrap_or("?");
            return Err(anyhow!("game {open} is still open"));
        }
        let endpoint = self.config.game_url(match_id);
        fetch_text(self.client, &endpoint, &[]).context("game page request failed")?;
        self.current = Some(endpoint);
        Ok(())
    }

    fn select_player(&mut self, player_name: &str) -> Result<Option<String>> {
        let Some(game) = &self.current else {
            return Err(anyhow!("no game open"));
        };
        let panel = game.clone().param("player", player_name);
        let html = fetch_text(self.client, &panel, &[]).context("player panel request failed")?;
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
        if parse_advanced_stats(&html).is_empty() {
            return Ok(None);
        }
        Ok(Some(html))
    }

    fn close_match(&mut self) {
        if let Some(game) = self.current.take() {
            debug!(match_id = game.get("matchId").unwrap_or("?"), "closed game");
        }
    }
}
