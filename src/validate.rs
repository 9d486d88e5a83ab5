use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{error, info, warn};

use crate::table::Table;

pub const CRITICAL_FIELDS: [&str; 5] = ["match_id", "player_name", "goals", "assists", "points"];
/// Minimum share of merged rows carrying a `war` value, in percent.
pub const MIN_WAR_COVERAGE_PCT: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    DuplicateKeys { rows: usize },
    MissingValues { field: String, missing: usize },
    LowCoverage { covered: usize, total: usize },
    NegativeGoals { rows: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub severity: Severity,
    pub kind: IssueKind,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::DuplicateKeys { rows } => write!(f, "Found {rows} duplicate records"),
            IssueKind::MissingValues { field, missing } => {
                write!(f, "{field} has {missing} missing values")
            }
            IssueKind::LowCoverage { covered, total } => write!(
                f,
                "Advanced stats coverage only {:.1}%",
                coverage_pct(*covered, *total)
            ),
            IssueKind::NegativeGoals { rows } => {
                write!(f, "Found negative goal values ({rows} rows)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub rows: usize,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Any issue fails the report, warnings included.
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// Run every check against `table`; no check short-circuits another.
pub fn validate_table(table: &Table) -> ValidationReport {
    let mut issues = Vec::new();
    issues.extend(check_duplicate_keys(table));
    issues.extend(check_missing_fields(table));
    issues.extend(check_war_coverage(table));
    issues.extend(check_negative_goals(table));
    ValidationReport {
        rows: table.len(),
        issues,
    }
}

/// Validate the merged table on disk and log the outcome.
///
/// A missing file is an error before any check runs.
pub fn validate_data(path: &Path) -> Result<ValidationReport> {
    info!("running data validation");
    if !path.exists() {
        return Err(anyhow!("merged stats file not found: {}", path.display()));
    }
    let table = Table::read_csv(path)?;
    let report = validate_table(&table);
    log_report(&report);
    Ok(report)
}

pub fn log_report(report: &ValidationReport) {
    if report.passed() {
        info!(rows = report.rows, "data validation passed");
        return;
    }
    for issue in &report.issues {
        match issue.severity {
            Severity::Warning => warn!("  - {issue}"),
            Severity::Error => error!("  - {issue}"),
        }
    }
    warn!("validation found {} issues", report.issues.len());
}

fn check_duplicate_keys(table: &Table) -> Option<Issue> {
    let cols = (table.column("match_id"), table.column("player_name"));
    let (Some(match_col), Some(player_col)) = cols else {
        return None;
    };
    let mut counts: HashMap<(Option<&str>, Option<&str>), usize> = HashMap::new();
    for row in 0..table.len() {
        let key = (table.cell(row, match_col), table.cell(row, player_col));
        *counts.entry(key).or_default() += 1;
    }
    // Every row sharing a key counts, not just the repeats.
    let rows = counts.values().filter(|&&n| n > 1).sum::<usize>();
    (rows > 0).then(|| Issue {
        severity: Severity::Warning,
        kind: IssueKind::DuplicateKeys { rows },
    })
}

fn check_missing_fields(table: &Table) -> Vec<Issue> {
    let mut out = Vec::new();
    for field in CRITICAL_FIELDS {
        let missing = match table.column(field) {
            Some(col) => (0..table.len())
                .filter(|&r| table.cell(r, col).is_none())
                .count(),
            None => table.len(),
        };
        if missing > 0 {
            out.push(Issue {
                severity: Severity::Warning,
                kind: IssueKind::MissingValues {
                    field: field.to_string(),
                    missing,
                },
            });
        }
    }
    out
}

fn check_war_coverage(table: &Table) -> Option<Issue> {
    let total = table.len();
    if total == 0 {
        return None;
    }
    let covered = table
        .column("war")
        .map(|col| (0..total).filter(|&r| table.cell(r, col).is_some()).count())
        .unwrap_or(0);
    // Integer comparison keeps the 90% boundary exact.
    if covered * 100 >= total * MIN_WAR_COVERAGE_PCT {
        return None;
    }
    Some(Issue {
        severity: Severity::Warning,
        kind: IssueKind::LowCoverage { covered, total },
    })
}

fn check_negative_goals(table: &Table) -> Option<Issue> {
    let col = table.column("goals")?;
    let rows = (0..table.len())
        .filter_map(|r| table.cell(r, col))
        .filter_map(|v| v.parse::<f64>().ok())
        .filter(|g| *g < 0.0)
        .count();
    (rows > 0).then(|| Issue {
        severity: Severity::Error,
        kind: IssueKind::NegativeGoals { rows },
    })
}

fn coverage_pct(covered: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    covered as f64 / total as f64 * 100.0
}
