use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

/// Header row plus string cells. An empty cell is a null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| anyhow!("missing column `{name}`"))
    }

    /// Trimmed cell value, `None` for nulls and out-of-range cells.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        let value = self.rows.get(row)?.get(col)?.trim();
        if value.is_empty() { None } else { Some(value) }
    }

    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("open {}", path.display()))?;
        let headers = reader
            .headers()
            .with_context(|| format!("read header of {}", path.display()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();
        let mut table = Table::new(headers);
        for (idx, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("read row {} of {}", idx + 1, path.display()))?;
            table.push_row(record.iter().map(|s| s.to_string()).collect());
        }
        Ok(table)
    }

    /// Write to a sibling temp file, then rename over `path`. A failed write
    /// leaves the previous file untouched.
    pub fn write_csv_atomic(&self, path: &Path) -> Result<()> {
        write_atomic(path, |tmp| {
            let mut writer = csv::Writer::from_path(tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            writer
                .write_record(&self.headers)
                .context("write csv header")?;
            for row in &self.rows {
                writer.write_record(row).context("write csv row")?;
            }
            writer.flush().context("flush csv")?;
            Ok(())
        })
    }
}

/// Run `write` against a temp path next to `path` and swap it into place.
pub fn write_atomic(path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp = tmp_path(path);
    if let Err(err) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Float text for table cells: always keeps a decimal point (`1.0`, `0.33`).
pub fn fmt_float(value: f64) -> String {
    format!("{value:?}")
}

/// Round half to even, so `0.125` becomes `0.12` and `6.25` becomes `6.2`.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_treats_blank_as_null() {
        let mut t = Table::new(vec!["a".into(), "b".into()]);
        t.push_row(vec!["1".into()]);
        assert_eq!(t.cell(0, 0), Some("1"));
        assert_eq!(t.cell(0, 1), None);
        assert_eq!(t.cell(3, 0), None);
    }

    #[test]
    fn float_formatting() {
        assert_eq!(fmt_float(1.0), "1.0");
        assert_eq!(fmt_float(round_to(1.0 / 3.0, 2)), "0.33");
        assert_eq!(fmt_float(round_to(200.0 / 3.0, 1)), "66.7");
    }

    #[test]
    fn rounding_ties_go_to_even() {
        assert_eq!(round_to(1.0 / 8.0, 2), 0.12);
        assert_eq!(round_to(6.25, 1), 6.2);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(245.0 / 60.0, 2), 4.08);
    }

    #[test]
    fn tmp_path_is_sibling() {
        let p = tmp_path(Path::new("data/processed/merged_stats.csv"));
        assert_eq!(p, Path::new("data/processed/merged_stats.csv.tmp"));
    }
}
