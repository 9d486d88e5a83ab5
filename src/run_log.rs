use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::pipeline::RunSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRun {
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub succeeded: bool,
    pub new_matches: i64,
    pub merged_rows: i64,
    pub validation: String,
    pub errors: Vec<String>,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            succeeded INTEGER NOT NULL,
            aborted INTEGER NOT NULL,
            discovery TEXT NOT NULL,
            new_matches INTEGER NOT NULL,
            new_match_ids_json TEXT NOT NULL,
            basic_appended INTEGER NOT NULL,
            advanced_appended INTEGER NOT NULL,
            merge_status TEXT NOT NULL,
            merged_rows INTEGER NOT NULL,
            validation TEXT NOT NULL,
            validation_issues_json TEXT NOT NULL,
            shot_capture TEXT NOT NULL,
            shot_players INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pipeline_runs_started ON pipeline_runs(started_at);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn record_run(conn: &Connection, run: &RunSummary) -> Result<i64> {
    let new_ids_json =
        serde_json::to_string(&run.new_match_ids).unwrap_or_else(|_| "[]".to_string());
    let issues_json =
        serde_json::to_string(&run.validation_issues).unwrap_or_else(|_| "[]".to_string());
    let errors_json = serde_json::to_string(&run.errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        r#"
        INSERT INTO pipeline_runs (
            started_at, finished_at, succeeded, aborted, discovery,
            new_matches, new_match_ids_json, basic_appended, advanced_appended,
            merge_status, merged_rows, validation, validation_issues_json,
            shot_capture, shot_players, errors_json
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13,
            ?14, ?15, ?16
        )
        "#,
        params![
            run.started_at,
            run.finished_at,
            bool_to_i64(run.succeeded()),
            bool_to_i64(run.aborted),
            run.discovery.as_str(),
            run.new_match_ids.len() as i64,
            new_ids_json,
            run.basic_appended as i64,
            run.advanced_appended as i64,
            run.merge.as_str(),
            run.merged_rows as i64,
            run.validation.as_str(),
            issues_json,
            run.shot_capture.as_str(),
            run.shot_players as i64,
            errors_json,
        ],
    )
    .context("insert pipeline run")?;
    Ok(conn.last_insert_rowid())
}

pub fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<StoredRun>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT run_id, started_at, finished_at, succeeded, new_matches,
                   merged_rows, validation, errors_json
            FROM pipeline_runs
            ORDER BY run_id DESC
            LIMIT ?1
            "#,
        )
        .context("prepare recent runs query")?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            let errors_json: String = row.get(7)?;
            Ok(StoredRun {
                run_id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                succeeded: row.get::<_, i64>(3)? != 0,
                new_matches: row.get(4)?,
                merged_rows: row.get(5)?,
                validation: row.get(6)?,
                errors: serde_json::from_str(&errors_json).unwrap_or_default(),
            })
        })
        .context("query recent runs")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode run row")?);
    }
    Ok(out)
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
