use anyhow::Result;
use serde_json::Value;

use crate::advanced::{AdvancedBatch, HttpSession, scrape_advanced_stats};
use crate::club_api;
use crate::config::{PipelineConfig, Roster};
use crate::records::{GameRecord, capture_timestamp};
use crate::shot_locations;

/// The upstream calls the pipeline depends on.
pub trait StatsSources {
    /// Recent regular-season match ids, in source order.
    fn discover_matches(&mut self) -> Result<Vec<String>>;

    fn fetch_basic_stats(&mut self) -> Result<Vec<GameRecord>>;

    /// Advanced stats for `match_ids`, extracted sequentially. Individual
    /// (match, player) failures land in the batch's `errors`.
    fn fetch_advanced_stats(&mut self, match_ids: &[String], roster: &Roster)
    -> Result<AdvancedBatch>;

    /// Raw members payload with career shot-location counts.
    fn fetch_members_stats(&mut self) -> Result<String>;
}

pub struct LiveSources {
    config: PipelineConfig,
    club_data: Option<Value>,
    session: Option<HttpSession>,
}

impl LiveSources {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.clone(),
            club_data: None,
            session: None,
        }
    }

    fn club_data(&mut self) -> Result<&Value> {
        let data = match self.club_data.take() {
            Some(data) => data,
            None => club_api::fetch_club_stats(&self.config)?,
        };
        Ok(self.club_data.insert(data))
    }
}

impl StatsSources for LiveSources {
    fn discover_matches(&mut self) -> Result<Vec<String>> {
        // Always refetch for discovery; the basic fetch reuses this payload.
        self.club_data = None;
        Ok(club_api::match_ids(self.club_data()?))
    }

    fn fetch_basic_stats(&mut self) -> Result<Vec<GameRecord>> {
        let club_id = self.config.club_id.clone();
        let data = self.club_data()?;
        Ok(club_api::game_records(data, &club_id, &capture_timestamp()))
    }

    fn fetch_advanced_stats(
        &mut self,
        match_ids: &[String],
        roster: &Roster,
    ) -> Result<AdvancedBatch> {
        let session = match self.session.take() {
            Some(session) => session,
            None => HttpSession::new(&self.config)?,
        };
        let session = self.session.insert(session);
        Ok(scrape_advanced_stats(session, match_ids, roster))
    }

    fn fetch_members_stats(&mut self) -> Result<String> {
        shot_locations::fetch_members_stats(&self.config)
    }
}
