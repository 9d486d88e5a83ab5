use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::records::StoreRecord;
use crate::table::{Table, write_atomic};

// The read-modify-write cycle below is not atomic on disk; every append in
// the process goes through this lock.
static STORE_LOCK: Mutex<()> = Mutex::new(());

/// Append the records of `batch` whose key is not yet stored in `path`.
///
/// Returns how many rows were appended. Existing rows are never updated: a
/// re-delivered key keeps its original values. An empty batch touches nothing.
pub fn append_new<T: StoreRecord>(path: &Path, batch: &[T]) -> Result<usize> {
    if batch.is_empty() {
        warn!(path = %path.display(), "no data to save");
        return Ok(0);
    }

    let _guard = STORE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let existing: Vec<T> = if path.exists() {
        load_records(path)?
    } else {
        Vec::new()
    };
    let mut seen = existing
        .iter()
        .map(StoreRecord::store_key)
        .collect::<HashSet<_>>();

    let mut fresh = Vec::new();
    for record in batch {
        if seen.insert(record.store_key()) {
            fresh.push(record);
        }
    }
    if fresh.is_empty() {
        info!(path = %path.display(), "no new records (all duplicates)");
        return Ok(0);
    }

    write_atomic(path, |tmp| {
        let mut writer =
            csv::Writer::from_path(tmp).with_context(|| format!("create {}", tmp.display()))?;
        for record in existing.iter().chain(fresh.iter().copied()) {
            writer.serialize(record).context("write store row")?;
        }
        writer.flush().context("flush store")?;
        Ok(())
    })?;

    info!(
        path = %path.display(),
        appended = fresh.len(),
        skipped = batch.len() - fresh.len(),
        total = existing.len() + fresh.len(),
        "saved new records"
    );
    Ok(fresh.len())
}

pub fn load_records<T: StoreRecord>(path: &Path) -> Result<Vec<T>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<T>().enumerate() {
        out.push(row.with_context(|| format!("decode row {} of {}", idx + 1, path.display()))?);
    }
    Ok(out)
}

/// Match ids present in either stored table. Missing tables contribute nothing.
pub fn existing_match_ids(basic_path: &Path, advanced_path: &Path) -> Result<HashSet<String>> {
    let mut ids = HashSet::new();
    for path in [basic_path, advanced_path] {
        if !path.exists() {
            continue;
        }
        let table = Table::read_csv(path)?;
        let col = table
            .require_column("match_id")
            .with_context(|| format!("read match ids from {}", path.display()))?;
        for row in 0..table.len() {
            if let Some(id) = table.cell(row, col) {
                ids.insert(id.to_string());
            }
        }
    }
    debug!(count = ids.len(), "loaded stored match ids");
    Ok(ids)
}
