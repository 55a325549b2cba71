//! Loading the record snapshot and its dictionaries.

use anyhow::{bail, Context, Result};
use std::path::Path;

use contact_search_core::models::{Dictionaries, RecordSnapshot, SearchableRecord};

use crate::config::Config;

/// Read a JSON array of records from `path`.
///
/// Fails on unreadable files, malformed JSON, warmth outside `0..=3`, and
/// duplicate ids.
pub fn load_snapshot(path: &Path) -> Result<RecordSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
    let records: Vec<SearchableRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot file: {}", path.display()))?;

    if let Some(bad) = records.iter().find(|r| r.warmth > 3) {
        bail!("record {} has warmth {} (expected 0-3)", bad.id, bad.warmth);
    }

    RecordSnapshot::new(records).with_context(|| format!("Invalid snapshot: {}", path.display()))
}

/// Known organizations and sources: the snapshot's own values plus the
/// configured extras.
pub fn build_dictionaries(config: &Config, snapshot: &RecordSnapshot) -> Dictionaries {
    let mut dictionaries = Dictionaries::from_snapshot(snapshot);
    dictionaries.extend(Dictionaries::new(
        config.dictionaries.organizations.iter().cloned(),
        config.dictionaries.sources.iter().cloned(),
    ));
    dictionaries
}

/// Load the snapshot named in config together with its dictionaries.
pub fn load(config: &Config) -> Result<(RecordSnapshot, Dictionaries)> {
    let snapshot = load_snapshot(&config.snapshot.path)?;
    let dictionaries = build_dictionaries(config, &snapshot);
    tracing::debug!(
        records = snapshot.len(),
        organizations = dictionaries.organizations.len(),
        sources = dictionaries.sources.len(),
        "snapshot loaded"
    );
    Ok((snapshot, dictionaries))
}
