//! Remote semantic search: wire contract, client trait, and filter applier.
//!
//! The remote endpoint reinterprets a raw query (usually with an LLM) and
//! answers with a loose, label-oriented list of intents. This module owns
//! the shape of that exchange and turns a response into scored results
//! shaped exactly like the deterministic path's output.
//!
//! Concrete HTTP clients live in the `contact-search` app crate.
//!
//! # Wire format
//!
//! ```text
//! → { "query": "...", "knownOrganizations": [...], "knownSources": [...] }
//! ← { "intents": [ { "type": "company", "label": "Acme" }, ... ] }
//! ```

use async_trait::async_trait;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Dictionaries, Intent, IntentKind, SearchResult, SearchableRecord, StructuredQuery,
};
use crate::parse::{time_window, warmth_level};
use crate::search::rank;

/// Fixed weight of a matched remote intent.
///
/// Remote intents are treated as already disambiguated, so a match is
/// binary and outweighs any single deterministic match.
pub const REMOTE_MATCH_SCORE: f64 = 5.0;

/// Request body sent to the remote endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest<'a> {
    pub query: &'a str,
    pub known_organizations: Vec<&'a str>,
    pub known_sources: Vec<&'a str>,
}

impl<'a> RemoteRequest<'a> {
    pub fn new(query: &'a str, dictionaries: &'a Dictionaries) -> Self {
        Self {
            query,
            known_organizations: dictionaries.organizations.iter().map(String::as_str).collect(),
            known_sources: dictionaries.sources.iter().map(String::as_str).collect(),
        }
    }
}

/// One intent as interpreted by the remote endpoint.
///
/// `kind` is free-form; unknown values are ignored by [`apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIntent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
}

/// Successful remote response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub intents: Vec<RemoteIntent>,
}

/// The remote path is unavailable.
///
/// Every variant means the same thing to callers: keep showing the
/// deterministic results. The variants only exist for logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteUnavailable {
    #[error("remote search unavailable: {0}")]
    Transport(String),
    #[error("remote search unavailable: HTTP {0}")]
    Status(u16),
    #[error("remote search unavailable: malformed response ({0})")]
    Malformed(String),
}

/// Asynchronous remote semantic search.
///
/// Implementations perform exactly one outbound request per call and never
/// retry; re-invocation on a later input is the caller's business.
#[async_trait]
pub trait RemoteSearch: Send + Sync {
    /// Short identifier for logs (e.g. `"http"`).
    fn name(&self) -> &str;

    /// Ask the remote endpoint to interpret `raw`.
    async fn call_remote(
        &self,
        raw: &str,
        dictionaries: &Dictionaries,
    ) -> Result<RemoteResponse, RemoteUnavailable>;
}

/// Decode a response body.
///
/// Accepts `{ "intents": [...] }`; anything else is [`RemoteUnavailable::Malformed`].
pub fn parse_response(body: &[u8]) -> Result<RemoteResponse, RemoteUnavailable> {
    serde_json::from_slice(body).map_err(|e| RemoteUnavailable::Malformed(e.to_string()))
}

/// Field predicate a remote intent type maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteTarget {
    Intent(IntentKind),
    FreeText,
    Location,
}

impl RemoteTarget {
    /// Map a remote `type` string to a target, or `None` if unsupported.
    pub fn resolve(kind: &str) -> Option<Self> {
        if let Some(kind) = IntentKind::from_loose(kind) {
            return Some(Self::Intent(kind));
        }
        let key: String = kind
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "keyword" | "text" | "freetext" | "query" => Some(Self::FreeText),
            "location" | "city" | "state" | "country" | "place" => Some(Self::Location),
            _ => None,
        }
    }
}

/// Score records against a remote response, using the current time.
pub fn apply(response: &RemoteResponse, records: &[SearchableRecord]) -> Vec<SearchResult> {
    apply_at(response, records, Utc::now())
}

/// Score records against a remote response with an explicit reference time.
///
/// One result per record, ranked with the same stable ordering as the
/// deterministic path. Intents with an unsupported `type` or an empty
/// label are skipped, and a repeated `(type, label)` pair counts once.
pub fn apply_at(
    response: &RemoteResponse,
    records: &[SearchableRecord],
    now: DateTime<Utc>,
) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let usable: Vec<(RemoteTarget, &RemoteIntent)> = response
        .intents
        .iter()
        .filter(|i| !i.label.trim().is_empty())
        .filter_map(|i| RemoteTarget::resolve(&i.kind).map(|t| (t, i)))
        .filter(|(target, i)| seen.insert((*target, i.label.trim().to_lowercase())))
        .collect();

    let results = records
        .iter()
        .map(|record| {
            let explanations: Vec<String> = usable
                .iter()
                .filter(|(target, intent)| matches(*target, &intent.label, record, now))
                .map(|(_, intent)| format!("matched {} '{}'", intent.kind, intent.label.trim()))
                .collect();
            SearchResult {
                record_id: record.id,
                score: REMOTE_MATCH_SCORE * explanations.len() as f64,
                explanations,
            }
        })
        .collect();

    rank(results)
}

/// Build the display query for a remote result set.
///
/// Recognized intents become label-only [`Intent`]s; unsupported types are
/// dropped since they have nothing to show a chip for.
pub fn remote_query(raw: &str, response: &RemoteResponse) -> StructuredQuery {
    let mut query = StructuredQuery {
        raw: raw.to_string(),
        ..Default::default()
    };
    for intent in &response.intents {
        let label = intent.label.trim();
        if label.is_empty() {
            continue;
        }
        match RemoteTarget::resolve(&intent.kind) {
            Some(RemoteTarget::Intent(kind)) => {
                query.push_intent(Intent::new(kind, "", label));
            }
            Some(RemoteTarget::FreeText) => {
                if !query.free_text.is_empty() {
                    query.free_text.push(' ');
                }
                query.free_text.push_str(label);
            }
            Some(RemoteTarget::Location) | None => {}
        }
    }
    query
}

fn matches(target: RemoteTarget, label: &str, record: &SearchableRecord, now: DateTime<Utc>) -> bool {
    let label = label.trim();
    match target {
        RemoteTarget::Intent(kind) => match kind {
            IntentKind::Company => contains_label(&record.organization, label),
            IntentKind::Source => contains_label(&record.source, label),
            IntentKind::Owner => contains_label(&record.owner, label),
            IntentKind::Role => contains_label(&record.title, label),
            IntentKind::Name => contains_label(&record.name, label),
            IntentKind::OrgKind => contains_label(&record.org_kind, label),
            IntentKind::OrgSector => contains_label(&record.org_sector, label),
            IntentKind::Tag => record.tags.iter().any(|t| contains_label(t, label)),
            IntentKind::DealName => record.deals.iter().any(|d| contains_label(&d.name, label)),
            IntentKind::DealSector => record.deals.iter().any(|d| contains_label(&d.sector, label)),
            IntentKind::DealStatus => record.deals.iter().any(|d| contains_label(&d.status, label)),
            IntentKind::Warmth => warmth_level(label) == Some(record.warmth),
            IntentKind::Time => {
                time_window(label).is_some_and(|w| w.contains(record.last_activity(), now))
            }
        },
        RemoteTarget::FreeText => [
            record.name.as_str(),
            record.organization.as_str(),
            record.title.as_str(),
            record.email.as_str(),
        ]
        .into_iter()
        .chain(record.tags.iter().map(String::as_str))
        .any(|field| contains_label(field, label)),
        RemoteTarget::Location => [&record.city, &record.state, &record.country]
            .into_iter()
            .any(|field| contains_label(field, label)),
    }
}

/// Case-insensitive containment, tolerating a plural label (`"Investors"`
/// matches `"Angel Investor"`).
fn contains_label(field: &str, label: &str) -> bool {
    let field = field.to_lowercase();
    let label = label.to_lowercase();
    if field.is_empty() || label.is_empty() {
        return false;
    }
    field.contains(&label)
        || label
            .strip_suffix('s')
            .is_some_and(|singular| !singular.is_empty() && field.contains(singular))
}
