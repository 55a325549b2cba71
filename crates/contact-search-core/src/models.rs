//! Core data models used throughout Contact Search.
//!
//! These types represent the records, structured queries, and scored
//! results that flow through the deterministic and remote search paths.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a recognized query intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentKind {
    Company,
    Source,
    Owner,
    Role,
    Warmth,
    Time,
    Tag,
    Name,
    OrgKind,
    OrgSector,
    DealName,
    DealSector,
    DealStatus,
}

impl IntentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Source => "source",
            Self::Owner => "owner",
            Self::Role => "role",
            Self::Warmth => "warmth",
            Self::Time => "time",
            Self::Tag => "tag",
            Self::Name => "name",
            Self::OrgKind => "orgKind",
            Self::OrgSector => "orgSector",
            Self::DealName => "dealName",
            Self::DealSector => "dealSector",
            Self::DealStatus => "dealStatus",
        }
    }

    /// Resolve a loosely-typed intent name, as sent by the remote endpoint.
    ///
    /// Accepts the canonical names case-insensitively plus a few aliases
    /// (`organization`, `title`, `org_kind`, ...). Returns `None` for
    /// anything unrecognized.
    pub fn from_loose(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let kind = match key.as_str() {
            "company" | "org" | "organization" | "organisation" => Self::Company,
            "source" | "leadsource" => Self::Source,
            "owner" | "ownedby" => Self::Owner,
            "role" | "title" | "jobtitle" => Self::Role,
            "warmth" | "temperature" => Self::Warmth,
            "time" | "date" | "recency" => Self::Time,
            "tag" | "tags" | "label" => Self::Tag,
            "name" | "person" | "contact" => Self::Name,
            "orgkind" | "organizationkind" | "orgtype" => Self::OrgKind,
            "orgsector" | "sector" | "industry" => Self::OrgSector,
            "dealname" | "deal" => Self::DealName,
            "dealsector" => Self::DealSector,
            "dealstatus" | "dealstage" => Self::DealStatus,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recognized intent within a [`StructuredQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    /// Normalized match value. Empty for label-only intents built from a
    /// remote response, which are for display and never re-filtered.
    pub value: String,
    /// Human-readable chip text.
    pub label: String,
}

impl Intent {
    pub fn new(kind: IntentKind, value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            label: label.into(),
        }
    }

    pub fn is_label_only(&self) -> bool {
        self.value.is_empty()
    }
}

/// Parsed form of a raw query string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub raw: String,
    pub free_text: String,
    pub intents: Vec<Intent>,
}

impl StructuredQuery {
    /// Append an intent unless the same `(kind, value)` pair is already present.
    ///
    /// Label-only intents have no value to compare, so they are deduplicated
    /// on `(kind, label)` instead. Returns `true` when the intent was added.
    pub fn push_intent(&mut self, intent: Intent) -> bool {
        let duplicate = self.intents.iter().any(|i| {
            i.kind == intent.kind
                && if intent.is_label_only() {
                    i.is_label_only() && i.label.eq_ignore_ascii_case(&intent.label)
                } else {
                    i.value == intent.value
                }
        });
        if duplicate {
            return false;
        }
        self.intents.push(intent);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && self.free_text.trim().is_empty()
    }
}

/// Relative time constraint carried in the value of a `time` intent.
///
/// Encoded as `within:<N>d` (touched in the last N days) or `before:<N>d`
/// (not touched for N days, or never).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Within { days: i64 },
    Before { days: i64 },
}

impl TimeWindow {
    pub fn to_value(self) -> String {
        match self {
            Self::Within { days } => format!("within:{}d", days),
            Self::Before { days } => format!("before:{}d", days),
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        let (mode, rest) = value.split_once(':')?;
        let days: i64 = rest.strip_suffix('d')?.parse().ok()?;
        if days <= 0 {
            return None;
        }
        match mode {
            "within" => Some(Self::Within { days }),
            "before" => Some(Self::Before { days }),
            _ => None,
        }
    }

    /// Whether a record last active at `at` falls inside this window.
    pub fn contains(self, at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Within { days } => {
                at.is_some_and(|t| t <= now && now - t <= chrono::Duration::days(days))
            }
            Self::Before { days } => at.map_or(true, |t| now - t > chrono::Duration::days(days)),
        }
    }

    pub fn describe(self) -> String {
        match self {
            Self::Within { days } => format!("last contacted within {} days", days),
            Self::Before { days } => format!("not contacted in {} days", days),
        }
    }
}

/// Known-value dictionaries consulted by the parser and sent to the
/// remote endpoint.
///
/// Ordered sets keep parser output and request bodies reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionaries {
    pub organizations: BTreeSet<String>,
    pub sources: BTreeSet<String>,
}

impl Dictionaries {
    pub fn new<O, S>(organizations: O, sources: S) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            organizations: clean_set(organizations),
            sources: clean_set(sources),
        }
    }

    /// Collect the distinct organizations and sources present in a snapshot.
    pub fn from_snapshot(snapshot: &RecordSnapshot) -> Self {
        Self::new(
            snapshot.iter().map(|r| r.organization.clone()),
            snapshot.iter().map(|r| r.source.clone()),
        )
    }

    /// Merge another dictionary into this one.
    pub fn extend(&mut self, other: Dictionaries) {
        self.organizations.extend(other.organizations);
        self.sources.extend(other.sources);
    }
}

fn clean_set<I>(values: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// A deal linked to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DealRef {
    pub name: String,
    pub sector: String,
    pub status: String,
}

/// Projection of a contact entity onto the fields used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchableRecord {
    pub id: i64,
    pub name: String,
    pub organization: String,
    pub title: String,
    pub email: String,
    /// Ordinal relationship warmth: 0 = cold, 1 = warm, 2 = hot, 3 = champion.
    pub warmth: u8,
    pub source: String,
    pub tags: Vec<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub owner: String,
    pub org_kind: String,
    pub org_sector: String,
    pub deals: Vec<DealRef>,
}

impl SearchableRecord {
    /// Most recent touch point: last contact, falling back to creation.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_contacted_at.or(self.created_at)
    }
}

/// Immutable list of records for one or more search passes.
///
/// Cloning is cheap (shared `Arc`). Record ids are guaranteed unique.
#[derive(Debug, Clone, Default)]
pub struct RecordSnapshot {
    records: Arc<[SearchableRecord]>,
}

impl RecordSnapshot {
    /// Build a snapshot, rejecting duplicate record ids.
    pub fn new(records: Vec<SearchableRecord>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.id) {
                bail!("duplicate record id {} in snapshot", record.id);
            }
        }
        Ok(Self {
            records: records.into(),
        })
    }

    pub fn records(&self) -> &[SearchableRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchableRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A scored record in a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub record_id: i64,
    /// Non-negative; only relative ordering is meaningful.
    pub score: f64,
    /// Why the record matched, one entry per contributing intent or term.
    pub explanations: Vec<String>,
}

/// Which path produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Deterministic,
    Llm,
}

impl ResultSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Llm => "llm",
        }
    }
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
