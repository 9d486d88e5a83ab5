use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};
use chel_pipeline::advanced::{AdvancedBatch, BrowsingSession, scrape_advanced_stats};
use chel_pipeline::config::{PipelineConfig, Roster};
use chel_pipeline::pipeline::{Pipeline, StageStatus};
use chel_pipeline::records::GameRecord;
use chel_pipeline::run_log;
use chel_pipeline::sources::StatsSources;

const ROSTER: [&str; 5] = ["MrBazzzz", "Mcapp_1", "TwoInchTommy565", "NYKings06", "Slick__AV"];

fn read_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn panel(war: f64) -> String {
    format!(r#"<div><p class="css-9y6e4h">WAR</p><p>{war}%</p></div>"#)
}

/// Records every call so tests can check ordering and pairing.
#[derive(Default)]
struct FakeSession {
    pages: HashMap<(String, String), String>,
    broken_games: HashSet<String>,
    broken_players: HashSet<(String, String)>,
    open: Option<String>,
    events: Vec<String>,
}

impl FakeSession {
    fn with_page(mut self, match_id: &str, player: &str, html: String) -> Self {
        self.pages
            .insert((match_id.to_string(), player.to_string()), html);
        self
    }
}

impl BrowsingSession for FakeSession {
    fn open_match(&mut self, match_id: &str) -> Result<()> {
        if let Some(open) = &self.open {
            return Err(anyhow!("game {open} is still open"));
        }
        self.events.push(format!("open {match_id}"));
        if self.broken_games.contains(match_id) {
            return Err(anyhow!("page did not load"));
        }
        self.open = Some(match_id.to_string());
        Ok(())
    }

    fn select_player(&mut self, player_name: &str) -> Result<Option<String>> {
        let match_id = self.open.clone().ok_or_else(|| anyhow!("no game open"))?;
        self.events.push(format!("select {match_id} {player_name}"));
        let key = (match_id, player_name.to_string());
        if self.broken_players.contains(&key) {
            return Err(anyhow!("dropdown timed out"));
        }
        Ok(self.pages.get(&key).cloned())
    }

    fn close_match(&mut self) {
        if let Some(id) = self.open.take() {
            self.events.push(format!("close {id}"));
        }
    }
}

struct FakeSources {
    discovered: Option<Vec<String>>,
    basic: Vec<GameRecord>,
    session: FakeSession,
    members: Option<String>,
}

impl FakeSources {
    fn new(discovered: &[&str]) -> Self {
        Self {
            discovered: Some(discovered.iter().map(|s| s.to_string()).collect()),
            basic: Vec::new(),
            session: FakeSession::default(),
            members: Some(read_fixture("proclubs_members_stats.json")),
        }
    }
}

impl StatsSources for FakeSources {
    fn discover_matches(&mut self) -> Result<Vec<String>> {
        self.discovered
            .clone()
            .ok_or_else(|| anyhow!("club stats request failed: http 503"))
    }

    fn fetch_basic_stats(&mut self) -> Result<Vec<GameRecord>> {
        Ok(self.basic.clone())
    }

    fn fetch_advanced_stats(
        &mut self,
        match_ids: &[String],
        roster: &Roster,
    ) -> Result<AdvancedBatch> {
        Ok(scrape_advanced_stats(&mut self.session, match_ids, roster))
    }

    fn fetch_members_stats(&mut self) -> Result<String> {
        self.members
            .clone()
            .ok_or_else(|| anyhow!("members stats request failed"))
    }
}

fn test_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::with_data_dir(root.join("data"));
    config.log_dir = root.join("logs");
    config
}

fn basic_rows(match_id: &str) -> Vec<GameRecord> {
    ROSTER
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut r = GameRecord::new(match_id, (i + 1).to_string());
            r.player_name = Some(name.to_string());
            r.goals = Some(1);
            r.assists = Some(0);
            r.points = Some(1);
            r.scraped_at = "2026-10-19T10:00:00.000000".to_string();
            r
        })
        .collect()
}

fn sources_for_match_100() -> FakeSources {
    let mut sources = FakeSources::new(&["100"]);
    sources.basic = basic_rows("100");
    let mut session = FakeSession::default();
    for (i, name) in ROSTER[..4].iter().enumerate() {
        session = session.with_page("100", name, panel(10.0 + i as f64));
    }
    sources.session = session;
    sources
}

#[test]
fn new_game_runs_through_every_stage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let mut pipeline = Pipeline::new(config.clone(), sources_for_match_100());

    let summary = pipeline.run();
    assert!(summary.succeeded(), "{:?}", summary.errors);
    assert_eq!(summary.discovery, StageStatus::Succeeded);
    assert_eq!(summary.new_match_ids, ["100"]);
    assert_eq!(summary.basic_appended, 5);
    assert_eq!(summary.advanced_appended, 4);
    assert_eq!(summary.merge, StageStatus::Succeeded);
    assert_eq!(summary.merged_rows, 5);
    // 4 of 5 rows carry WAR: advisory only.
    assert_eq!(summary.validation, StageStatus::Failed);
    assert_eq!(
        summary.validation_issues,
        ["Advanced stats coverage only 80.0%"]
    );
    assert_eq!(summary.shot_capture, StageStatus::Succeeded);
    assert_eq!(summary.shot_players, 2);

    assert!(config.merged_stats_path().exists());
    assert!(config.shot_locations_path().exists());
    assert!(config.members_stats_path().exists());
}

#[test]
fn rerun_with_nothing_new_skips_collection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let mut pipeline = Pipeline::new(config.clone(), sources_for_match_100());
    pipeline.run();
    let merged_before = fs::read(config.merged_stats_path()).expect("merged");
    let basic_before = fs::read(config.basic_stats_path()).expect("basic");

    let mut again = Pipeline::new(config.clone(), sources_for_match_100());
    let summary = again.run();
    assert!(summary.succeeded(), "{:?}", summary.errors);
    assert!(summary.new_match_ids.is_empty());
    assert_eq!(summary.merge, StageStatus::Skipped);
    assert_eq!(summary.validation, StageStatus::Skipped);
    assert_eq!(summary.shot_capture, StageStatus::Succeeded);
    assert_eq!(fs::read(config.merged_stats_path()).expect("merged"), merged_before);
    assert_eq!(fs::read(config.basic_stats_path()).expect("basic"), basic_before);
}

#[test]
fn only_unstored_matches_are_scraped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    Pipeline::new(config.clone(), sources_for_match_100()).run();

    let mut sources = FakeSources::new(&["101", "100"]);
    sources.basic = [basic_rows("101"), basic_rows("100")].concat();
    sources.session = FakeSession::default().with_page("101", "MrBazzzz", panel(7.5));
    let mut pipeline = Pipeline::new(config.clone(), sources);
    let summary = pipeline.run();

    assert_eq!(summary.new_match_ids, ["101"]);
    assert_eq!(summary.basic_appended, 5);
    assert_eq!(summary.advanced_appended, 1);
    assert_eq!(summary.merged_rows, 10);
}

#[test]
fn negative_goals_fail_the_run_but_keep_the_merge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let mut sources = sources_for_match_100();
    sources.basic[2].goals = Some(-1);
    let mut pipeline = Pipeline::new(config.clone(), sources);

    let summary = pipeline.run();
    assert!(!summary.succeeded());
    assert!(!summary.aborted);
    assert_eq!(summary.merge, StageStatus::Succeeded);
    assert_eq!(summary.validation, StageStatus::Failed);
    assert_eq!(
        summary.errors,
        ["validation: Found negative goal values (1 rows)"]
    );
    assert!(config.merged_stats_path().exists());
}

#[test]
fn discovery_failure_still_refreshes_shot_locations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let mut sources = sources_for_match_100();
    sources.discovered = None;
    let mut pipeline = Pipeline::new(config.clone(), sources);

    let summary = pipeline.run();
    assert!(!summary.succeeded());
    assert!(!summary.aborted);
    assert_eq!(summary.discovery, StageStatus::Failed);
    assert!(summary.new_match_ids.is_empty());
    assert_eq!(summary.merge, StageStatus::Skipped);
    assert_eq!(summary.shot_capture, StageStatus::Succeeded);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("match discovery"));
    assert!(!config.basic_stats_path().exists());
    assert!(config.shot_locations_path().exists());
}

#[test]
fn failed_members_capture_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    Pipeline::new(config.clone(), sources_for_match_100()).run();
    let snapshot_before = fs::read(config.shot_locations_path()).expect("snapshot");

    let mut sources = sources_for_match_100();
    sources.members = None;
    let summary = Pipeline::new(config.clone(), sources).run();
    assert_eq!(summary.shot_capture, StageStatus::Failed);
    assert!(!summary.aborted);
    assert_eq!(fs::read(config.shot_locations_path()).expect("snapshot"), snapshot_before);
}

#[test]
fn unreadable_store_aborts_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    fs::create_dir_all(config.raw_dir()).expect("raw dir");
    fs::write(config.basic_stats_path(), "foo,bar\n1,2\n").expect("corrupt store");

    let mut pipeline = Pipeline::new(config.clone(), sources_for_match_100());
    let summary = pipeline.run();
    assert!(summary.aborted);
    assert!(!summary.succeeded());
    assert!(summary.errors[0].starts_with("unexpected"));
    assert_eq!(summary.shot_capture, StageStatus::Skipped);
    assert!(summary.finished_at.is_some());
}

#[test]
fn player_failures_are_recorded_and_matches_always_closed() {
    let roster = Roster::new(["MrBazzzz", "NYKings06"]);
    let mut session = FakeSession::default()
        .with_page("100", "MrBazzzz", panel(12.5))
        .with_page("102", "NYKings06", panel(-2.0));
    session
        .broken_players
        .insert(("100".to_string(), "NYKings06".to_string()));
    session.broken_games.insert("101".to_string());

    let ids = ["100", "101", "102"].map(String::from);
    let batch = scrape_advanced_stats(&mut session, &ids, &roster);

    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.records[0].match_id, "100");
    assert_eq!(batch.records[0].war, Some(12.5));
    assert_eq!(batch.records[1].player_name, "NYKings06");
    assert_eq!(batch.records[1].war, Some(-2.0));
    assert_eq!(batch.errors.len(), 2);
    assert!(batch.errors[0].contains("player NYKings06"));
    assert!(batch.errors[1].starts_with("game 101"));

    assert_eq!(
        session.events,
        [
            "open 100",
            "select 100 MrBazzzz",
            "select 100 NYKings06",
            "close 100",
            "open 101",
            "open 102",
            "select 102 MrBazzzz",
            "select 102 NYKings06",
            "close 102",
        ]
    );
    assert!(session.open.is_none());
}

#[test]
fn runs_are_recorded_in_the_ledger() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let first = Pipeline::new(config.clone(), sources_for_match_100()).run();
    let mut failing = sources_for_match_100();
    failing.discovered = None;
    let second = Pipeline::new(config.clone(), failing).run();

    let conn = run_log::open_db(&config.run_log_path()).expect("open ledger");
    let first_id = run_log::record_run(&conn, &first).expect("record first");
    let second_id = run_log::record_run(&conn, &second).expect("record second");
    assert!(second_id > first_id);

    let runs = run_log::recent_runs(&conn, 10).expect("recent runs");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, second_id);
    assert!(!runs[0].succeeded);
    assert_eq!(runs[0].errors.len(), 1);
    assert!(runs[1].succeeded);
    assert_eq!(runs[1].new_matches, 1);
    assert_eq!(runs[1].merged_rows, 5);
    assert_eq!(runs[1].validation, "failed");

    assert_eq!(run_log::recent_runs(&conn, 1).expect("limited").len(), 1);
}

#[test]
fn ledger_reports_an_unusable_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("a").join("b").join("runs.sqlite");
    run_log::open_db(&nested).expect("nested dirs are created");

    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "x").expect("write blocker file");
    let err = run_log::open_db(&blocker.join("runs.sqlite")).expect_err("parent is a file");
    assert!(format!("{err:#}").contains("create directory"), "{err:#}");
}
