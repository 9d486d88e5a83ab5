use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::sources::StatsSources;
use crate::validate::Severity;
use crate::{merge, shot_locations, store, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Skipped,
    Succeeded,
    Failed,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Skipped => "skipped",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub discovery: StageStatus,
    pub new_match_ids: Vec<String>,
    pub basic_appended: usize,
    pub advanced_appended: usize,
    pub merge: StageStatus,
    pub merged_rows: usize,
    pub validation: StageStatus,
    pub validation_issues: Vec<String>,
    pub shot_capture: StageStatus,
    pub shot_players: usize,
    pub errors: Vec<String>,
    pub aborted: bool,
}

impl RunSummary {
    fn start() -> Self {
        Self {
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            discovery: StageStatus::Skipped,
            new_match_ids: Vec::new(),
            basic_appended: 0,
            advanced_appended: 0,
            merge: StageStatus::Skipped,
            merged_rows: 0,
            validation: StageStatus::Skipped,
            validation_issues: Vec::new(),
            shot_capture: StageStatus::Skipped,
            shot_players: 0,
            errors: Vec::new(),
            aborted: false,
        }
    }

    /// Completed without logging an error. Warning-class validation issues
    /// are advisory and do not count; error-class ones land in `errors`.
    pub fn succeeded(&self) -> bool {
        !self.aborted && self.errors.is_empty()
    }

    fn fail(&mut self, stage: &str, err: &anyhow::Error) {
        error!("{stage} failed: {err:#}");
        self.errors.push(format!("{stage}: {err:#}"));
    }
}

/// Runs one full collection pass.
///
/// New-game collection (discover, basic, advanced, merge, validate) and the
/// shot-location refresh are independent: a failed stage is logged and the
/// remaining stages still run. Only an unexpected error, such as an unreadable
/// store table, ends the run early.
pub struct Pipeline<S> {
    config: PipelineConfig,
    sources: S,
}

impl<S: StatsSources> Pipeline<S> {
    pub fn new(config: PipelineConfig, sources: S) -> Self {
        Self { config, sources }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary::start();
        info!("{}", "=".repeat(70));
        info!("chel stats pipeline starting at {}", summary.started_at);
        info!("{}", "=".repeat(70));

        if let Err(err) = self.run_stages(&mut summary) {
            error!("pipeline failed with error: {err:?}");
            summary.errors.push(format!("unexpected: {err:#}"));
            summary.aborted = true;
        }
        summary.finished_at = Some(Utc::now().to_rfc3339());

        info!("{}", "=".repeat(70));
        if summary.aborted {
            error!("pipeline aborted");
        } else if summary.succeeded() {
            info!("pipeline completed successfully");
        } else {
            warn!(
                "pipeline completed with {} error(s)",
                summary.errors.len()
            );
        }
        if summary.new_match_ids.is_empty() {
            info!("no new games processed");
        } else {
            info!("processed {} new games", summary.new_match_ids.len());
        }
        info!("{}", "=".repeat(70));
        summary
    }

    fn run_stages(&mut self, summary: &mut RunSummary) -> Result<()> {
        self.config.ensure_dirs()?;
        self.collect_new_games(summary)?;
        self.refresh_shot_locations(summary);
        Ok(())
    }

    fn collect_new_games(&mut self, summary: &mut RunSummary) -> Result<()> {
        info!("[step 1] checking for new games");
        let candidates = match self.sources.discover_matches() {
            Ok(ids) => {
                summary.discovery = StageStatus::Succeeded;
                ids
            }
            Err(err) => {
                summary.discovery = StageStatus::Failed;
                summary.fail("match discovery", &err);
                return Ok(());
            }
        };

        let stored = store::existing_match_ids(
            &self.config.basic_stats_path(),
            &self.config.advanced_stats_path(),
        )?;
        let new_ids = new_match_ids(&candidates, &stored);
        if new_ids.is_empty() {
            info!("no new games found");
            return Ok(());
        }
        info!("found {} new games to scrape", new_ids.len());
        summary.new_match_ids = new_ids.clone();

        info!("[step 2] scraping basic stats");
        match self.sources.fetch_basic_stats() {
            Ok(records) => {
                summary.basic_appended =
                    store::append_new(&self.config.basic_stats_path(), &records)?;
                info!("saved {} basic stat records", summary.basic_appended);
            }
            Err(err) => summary.fail("basic stats", &err),
        }

        info!("[step 3] scraping advanced stats");
        match self
            .sources
            .fetch_advanced_stats(&new_ids, &self.config.roster)
        {
            Ok(batch) => {
                for item in &batch.errors {
                    summary.errors.push(format!("advanced stats: {item}"));
                }
                summary.advanced_appended =
                    store::append_new(&self.config.advanced_stats_path(), &batch.records)?;
                info!("saved {} advanced stat records", summary.advanced_appended);
            }
            Err(err) => summary.fail("advanced stats", &err),
        }

        info!("[step 4] merging datasets");
        match merge::merge_stats(&self.config) {
            Ok(merged) => {
                summary.merge = StageStatus::Succeeded;
                summary.merged_rows = merged.merged_rows;
            }
            Err(err) => {
                summary.merge = StageStatus::Failed;
                summary.fail("merge", &err);
            }
        }

        info!("[step 5] validating data");
        match validate::validate_data(&self.config.merged_stats_path()) {
            Ok(report) => {
                summary.validation_issues = report.issues.iter().map(|i| i.to_string()).collect();
                // Error-class issues count against the run; warnings stay advisory.
                for issue in report
                    .issues
                    .iter()
                    .filter(|i| i.severity == Severity::Error)
                {
                    summary.errors.push(format!("validation: {issue}"));
                }
                if report.passed() {
                    summary.validation = StageStatus::Succeeded;
                } else {
                    summary.validation = StageStatus::Failed;
                    warn!("validation found issues (see above)");
                }
            }
            Err(err) => {
                summary.validation = StageStatus::Failed;
                summary.fail("validation", &err);
            }
        }
        Ok(())
    }

    fn refresh_shot_locations(&mut self, summary: &mut RunSummary) {
        info!("[step 6] capturing shot location data");
        let members_path = self.config.members_stats_path();
        let captured = self
            .sources
            .fetch_members_stats()
            .and_then(|raw| shot_locations::save_members_json(&members_path, &raw));
        if let Err(err) = captured {
            summary.shot_capture = StageStatus::Failed;
            summary.fail("shot location capture", &err);
            warn!("skipping shot location processing");
            return;
        }

        info!("[step 7] processing shot location data");
        match shot_locations::process_shot_locations(&self.config) {
            Ok(snapshot) => {
                summary.shot_capture = StageStatus::Succeeded;
                summary.shot_players = snapshot.players;
                info!("collected shot location data for {} players", snapshot.players);
            }
            Err(err) => {
                summary.shot_capture = StageStatus::Failed;
                summary.fail("shot location processing", &err);
            }
        }
    }
}

/// Candidates not yet stored, in candidate order, each once.
pub fn new_match_ids(candidates: &[String], stored: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && !stored.contains(*id))
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}
