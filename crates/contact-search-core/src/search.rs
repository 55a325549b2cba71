//! Deterministic matcher and scorer.
//!
//! Scores every record in a snapshot against a [`StructuredQuery`] without
//! any I/O. This is a soft ranking: an intent that does not match a record
//! contributes nothing, but never removes the record from the result set.
//! Callers apply their own display threshold.
//!
//! # Scoring
//!
//! 1. Each intent with a value is compared against its field:
//!    exact match scores [`EXACT_MATCH_SCORE`], containment scores
//!    [`PARTIAL_MATCH_SCORE`], anything else scores `0`.
//! 2. Warmth is a closed enumeration: equal level scores
//!    [`EXACT_MATCH_SCORE`], any other level scores `0`.
//! 3. Time intents score [`TIME_MATCH_SCORE`] when the record's last
//!    activity falls inside the window.
//! 4. Each free-text term scores the weight of the best field containing it
//!    (name > organization > title = tags > email).
//! 5. Results are sorted by score (desc). The sort is stable, so records
//!    with equal scores keep their snapshot order.

use std::cmp::Ordering;
use std::collections::HashSet;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::models::{
    Intent, IntentKind, SearchResult, SearchableRecord, StructuredQuery, TimeWindow,
};

pub const EXACT_MATCH_SCORE: f64 = 3.0;
pub const PARTIAL_MATCH_SCORE: f64 = 1.5;
pub const TIME_MATCH_SCORE: f64 = 2.0;

/// Free-text fields in the order they are tried, with their weights.
const FREE_TEXT_FIELDS: &[(&str, f64)] = &[
    ("name", 2.0),
    ("organization", 1.5),
    ("title", 1.0),
    ("tags", 1.0),
    ("email", 0.5),
];

/// Strength of a single field comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldMatch {
    Miss,
    Partial,
    Exact,
}

/// Case-insensitive comparison of a record field against a match value.
pub fn field_match(field: &str, value: &str) -> FieldMatch {
    let field = field.trim().to_lowercase();
    let value = value.trim().to_lowercase();
    if field.is_empty() || value.is_empty() {
        FieldMatch::Miss
    } else if field == value {
        FieldMatch::Exact
    } else if field.contains(&value) {
        FieldMatch::Partial
    } else {
        FieldMatch::Miss
    }
}

/// Score every record against `query`, using the current time for time intents.
pub fn execute(query: &StructuredQuery, records: &[SearchableRecord]) -> Vec<SearchResult> {
    execute_at(query, records, Utc::now())
}

/// Score every record against `query` with an explicit reference time.
///
/// Returns exactly one [`SearchResult`] per input record, ranked.
pub fn execute_at(
    query: &StructuredQuery,
    records: &[SearchableRecord],
    now: DateTime<Utc>,
) -> Vec<SearchResult> {
    let terms: Vec<String> = query
        .free_text
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let results = records
        .iter()
        .map(|record| score_record(query, &terms, record, now))
        .collect();

    rank(results)
}

/// Stable sort by score, highest first.
pub fn rank(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results
}

/// Check the result-set invariants against the records that produced it.
///
/// Fails on duplicate record ids, ids absent from `records`, and negative
/// or non-finite scores.
pub fn validate_results(results: &[SearchResult], records: &[SearchableRecord]) -> Result<()> {
    let known: HashSet<i64> = records.iter().map(|r| r.id).collect();
    let mut seen = HashSet::with_capacity(results.len());
    for r in results {
        if !seen.insert(r.record_id) {
            bail!("duplicate record id {} in result set", r.record_id);
        }
        if !known.contains(&r.record_id) {
            bail!("record id {} is not in the snapshot", r.record_id);
        }
        if !r.score.is_finite() || r.score < 0.0 {
            bail!("record id {} has invalid score {}", r.record_id, r.score);
        }
    }
    Ok(())
}

fn score_record(
    query: &StructuredQuery,
    terms: &[String],
    record: &SearchableRecord,
    now: DateTime<Utc>,
) -> SearchResult {
    let mut score = 0.0;
    let mut explanations = Vec::new();

    let hits = query
        .intents
        .iter()
        .filter(|i| !i.is_label_only())
        .filter_map(|i| score_intent(i, record, now))
        .chain(terms.iter().filter_map(|t| score_term(t, record)));

    for (s, why) in hits {
        score += s;
        explanations.push(why);
    }

    SearchResult {
        record_id: record.id,
        score,
        explanations,
    }
}

fn score_intent(
    intent: &Intent,
    record: &SearchableRecord,
    now: DateTime<Utc>,
) -> Option<(f64, String)> {
    let single = |field: &str, value: &str| explain(field, field_match(value, &intent.value), intent);
    let deals = record.deals.iter();

    match intent.kind {
        IntentKind::Company => single("organization", &record.organization),
        IntentKind::Source => single("source", &record.source),
        IntentKind::Owner => single("owner", &record.owner),
        IntentKind::Role => single("title", &record.title),
        IntentKind::Name => single("name", &record.name),
        IntentKind::OrgKind => single("organization kind", &record.org_kind),
        IntentKind::OrgSector => single("sector", &record.org_sector),
        IntentKind::Tag => best_of("tag", record.tags.iter().map(String::as_str), intent),
        IntentKind::DealName => best_of("deal", deals.map(|d| d.name.as_str()), intent),
        IntentKind::DealSector => best_of("deal sector", deals.map(|d| d.sector.as_str()), intent),
        IntentKind::DealStatus => best_of("deal status", deals.map(|d| d.status.as_str()), intent),
        IntentKind::Warmth => {
            let level: u8 = intent.value.parse().ok()?;
            (record.warmth == level)
                .then(|| (EXACT_MATCH_SCORE, format!("warmth is '{}'", intent.label)))
        }
        IntentKind::Time => {
            let window = TimeWindow::from_value(&intent.value)?;
            window
                .contains(record.last_activity(), now)
                .then(|| (TIME_MATCH_SCORE, window.describe()))
        }
    }
}

fn best_of<'a>(
    field: &str,
    values: impl Iterator<Item = &'a str>,
    intent: &Intent,
) -> Option<(f64, String)> {
    let best = values
        .map(|v| field_match(v, &intent.value))
        .max()
        .unwrap_or(FieldMatch::Miss);
    explain(field, best, intent)
}

fn explain(field: &str, m: FieldMatch, intent: &Intent) -> Option<(f64, String)> {
    match m {
        FieldMatch::Exact => Some((
            EXACT_MATCH_SCORE,
            format!("{} matches '{}'", field, intent.label),
        )),
        FieldMatch::Partial => Some((
            PARTIAL_MATCH_SCORE,
            format!("{} partially matches '{}'", field, intent.label),
        )),
        FieldMatch::Miss => None,
    }
}

fn score_term(term: &str, record: &SearchableRecord) -> Option<(f64, String)> {
    FREE_TEXT_FIELDS.iter().find_map(|(field, weight)| {
        let hit = match *field {
            "name" => contains_ci(&record.name, term),
            "organization" => contains_ci(&record.organization, term),
            "title" => contains_ci(&record.title, term),
            "tags" => record.tags.iter().any(|t| contains_ci(t, term)),
            _ => contains_ci(&record.email, term),
        };
        hit.then(|| (*weight, format!("{} contains '{}'", field, term)))
    })
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    !needle_lower.is_empty() && haystack.to_lowercase().contains(needle_lower)
}
