use super::types::Record;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load records from a JSON file containing an array of records.
///
/// Record ids must be unique within the file so `explain` can address them.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        anyhow::bail!("Records file not found at {}", path.display());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open records file at {}", path.display()))?;

    let records: Vec<Record> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse records: invalid JSON in {}", path.display()))?;

    let mut seen = HashSet::new();
    if let Some(dup) = records.iter().find(|r| !seen.insert(r.id.as_str())) {
        anyhow::bail!("Duplicate record id '{}' in {}", dup.id, path.display());
    }

    tracing::debug!(count = records.len(), path = %path.display(), "loaded records");
    Ok(records)
}
