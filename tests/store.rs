use std::fs;

use chel_pipeline::records::{AdvancedMetrics, AdvancedStatRecord, GameRecord};
use chel_pipeline::store::{append_new, existing_match_ids, load_records};

fn game(match_id: &str, player_id: &str, name: &str, goals: i64) -> GameRecord {
    let mut r = GameRecord::new(match_id, player_id);
    r.player_name = Some(name.to_string());
    r.goals = Some(goals);
    r.assists = Some(0);
    r.points = Some(goals);
    r.scraped_at = "2026-10-19T10:00:00.000000".to_string();
    r
}

fn advanced(match_id: &str, name: &str, war: f64) -> AdvancedStatRecord {
    let metrics = AdvancedMetrics {
        war: Some(war),
        ..AdvancedMetrics::default()
    };
    AdvancedStatRecord::from_metrics(match_id, name, metrics, "2026-10-19T10:05:00.000000")
}

#[test]
fn empty_batch_creates_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("raw").join("basic_stats.csv");
    let appended = append_new::<GameRecord>(&path, &[]).expect("empty append");
    assert_eq!(appended, 0);
    assert!(!path.exists());
}

#[test]
fn first_append_writes_header_and_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("basic_stats.csv");
    let appended = append_new(&path, &[game("100", "7", "MrBazzzz", 1), game("100", "12", "Mcapp_1", 0)])
        .expect("append");
    assert_eq!(appended, 2);

    let text = fs::read_to_string(&path).expect("read store");
    let header = text.lines().next().expect("header line");
    assert!(header.starts_with("match_id,timestamp,scraped_at,player_name,player_id"));
    let stored: Vec<GameRecord> = load_records(&path).expect("load");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].goals, Some(1));
    assert_eq!(stored[1].player_name.as_deref(), Some("Mcapp_1"));
    assert_eq!(stored[1].shots, None);
}

#[test]
fn already_stored_batch_leaves_file_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("basic_stats.csv");
    let batch = [game("100", "7", "MrBazzzz", 1), game("101", "7", "MrBazzzz", 2)];
    append_new(&path, &batch).expect("first append");
    let before = fs::read(&path).expect("read before");

    let appended = append_new(&path, &batch[..1]).expect("second append");
    assert_eq!(appended, 0);
    assert_eq!(fs::read(&path).expect("read after"), before);
}

#[test]
fn redelivered_key_keeps_original_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("basic_stats.csv");
    append_new(&path, &[game("100", "7", "MrBazzzz", 1)]).expect("first append");

    let appended = append_new(&path, &[game("100", "7", "MrBazzzz", 5), game("101", "7", "MrBazzzz", 0)])
        .expect("second append");
    assert_eq!(appended, 1);

    let stored: Vec<GameRecord> = load_records(&path).expect("load");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].match_id, "100");
    assert_eq!(stored[0].goals, Some(1));
    assert_eq!(stored[1].match_id, "101");
}

#[test]
fn duplicates_inside_one_batch_are_stored_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("advanced_stats.csv");
    let batch = [
        advanced("100", "MrBazzzz", 12.5),
        advanced("100", "MrBazzzz", 99.0),
        advanced("100", "NYKings06", 3.0),
    ];
    assert_eq!(append_new(&path, &batch).expect("append"), 2);

    let stored: Vec<AdvancedStatRecord> = load_records(&path).expect("load");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].war, Some(12.5));
    assert_eq!(stored[1].player_name, "NYKings06");
}

#[test]
fn no_temp_file_is_left_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("advanced_stats.csv");
    append_new(&path, &[advanced("100", "MrBazzzz", 1.0)]).expect("append");
    let names = fs::read_dir(dir.path())
        .expect("list dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, ["advanced_stats.csv"]);
}

#[test]
fn stored_match_ids_union_both_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let basic = dir.path().join("basic_stats.csv");
    let adv = dir.path().join("advanced_stats.csv");

    let none = existing_match_ids(&basic, &adv).expect("no tables yet");
    assert!(none.is_empty());

    append_new(&basic, &[game("100", "7", "MrBazzzz", 1), game("101", "7", "MrBazzzz", 0)])
        .expect("basic append");
    append_new(&adv, &[advanced("101", "MrBazzzz", 2.0), advanced("102", "MrBazzzz", 4.0)])
        .expect("advanced append");

    let mut ids = existing_match_ids(&basic, &adv)
        .expect("ids")
        .into_iter()
        .collect::<Vec<_>>();
    ids.sort();
    assert_eq!(ids, ["100", "101", "102"]);
}

#[test]
fn unreadable_store_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let basic = dir.path().join("basic_stats.csv");
    fs::write(&basic, "foo,bar\n1,2\n").expect("write corrupt table");
    let err = existing_match_ids(&basic, &dir.path().join("advanced_stats.csv"))
        .expect_err("missing match_id column");
    assert!(format!("{err:#}").contains("match_id"));
}
