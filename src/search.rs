//! `csearch parse` and `csearch search`.
//!
//! `search` drives a [`SearchCoordinator`] through a single input and prints
//! each result set it emits: deterministic first, then (with `--remote`)
//! the remote-backed set or a "remote unavailable" notice. Human output goes
//! to stdout; `--json` prints one JSON object per emission.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use contact_search_core::models::{
    Dictionaries, RecordSnapshot, ResultSource, SearchResult, SearchableRecord, StructuredQuery,
};
use contact_search_core::parse;

use crate::config::Config;
use crate::coordinator::SearchCoordinator;
use crate::listener::{ChannelListener, SearchEvent};
use crate::remote::create_remote;
use crate::snapshot;

/// Options for `csearch search`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub remote: bool,
    pub json: bool,
    pub limit: Option<usize>,
}

/// One emission, as printed by `--json`.
#[derive(Debug, Serialize)]
struct JsonEmission<'a> {
    source: ResultSource,
    query: Option<&'a StructuredQuery>,
    results: Option<Vec<&'a SearchResult>>,
    #[serde(rename = "remoteUnavailable")]
    remote_unavailable: bool,
}

pub fn run_parse(config: &Config, query: &str, json: bool) -> Result<()> {
    let (_, dictionaries) = snapshot::load(config)?;
    let parsed = parse::parse(query, &dictionaries);

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    println!("query: {}", parsed.raw);
    if parsed.intents.is_empty() {
        println!("intents: (none)");
    } else {
        println!("intents:");
        for intent in &parsed.intents {
            println!("  {} = {:?}  ({})", intent.kind, intent.value, intent.label);
        }
    }
    if parsed.free_text.is_empty() {
        println!("free text: (none)");
    } else {
        println!("free text: {}", parsed.free_text);
    }
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, options: SearchOptions) -> Result<()> {
    let remote = if options.remote {
        match create_remote(&config.remote)? {
            Some(remote) => Some(remote),
            None => bail!("--remote requires a [remote] provider in config (provider is 'disabled')"),
        }
    } else {
        None
    };

    let (snapshot, dictionaries) = snapshot::load(config)?;
    let limit = options.limit.unwrap_or(config.retrieval.final_limit);
    if limit == 0 {
        bail!("--limit must be >= 1");
    }

    let events = collect_events(config, snapshot.clone(), dictionaries, remote, query).await?;

    let by_id: HashMap<i64, &SearchableRecord> = snapshot.iter().map(|r| (r.id, r)).collect();
    for event in &events {
        if options.json {
            print_json(event, limit)?;
        } else {
            print_human(event, &by_id, limit);
        }
    }
    Ok(())
}

/// Feed `query` into a fresh coordinator and gather what it emits until it
/// settles: one event without a remote, two with one.
async fn collect_events(
    config: &Config,
    snapshot: RecordSnapshot,
    dictionaries: Dictionaries,
    remote: Option<Arc<dyn contact_search_core::remote::RemoteSearch>>,
    query: &str,
) -> Result<Vec<SearchEvent>> {
    let (listener, mut rx) = ChannelListener::new();
    let coordinator = SearchCoordinator::new(
        snapshot,
        dictionaries,
        remote,
        Arc::new(listener),
        Duration::from_millis(config.coordinator.debounce_ms),
    );
    coordinator.input(query);

    let mut events = Vec::new();
    let Some(first) = rx.recv().await else {
        bail!("search coordinator stopped before emitting results");
    };
    let cleared = matches!(first, SearchEvent::Results { results: None, .. });
    events.push(first);

    if coordinator.has_remote() && !cleared {
        if let Some(second) = rx.recv().await {
            events.push(second);
        }
    }
    coordinator.dispose();
    Ok(events)
}

fn print_json(event: &SearchEvent, limit: usize) -> Result<()> {
    let emission = match event {
        SearchEvent::Results {
            results,
            query,
            source,
        } => JsonEmission {
            source: *source,
            query: query.as_ref(),
            results: results.as_ref().map(|r| visible(r, limit)),
            remote_unavailable: false,
        },
        SearchEvent::RemoteUnavailable { .. } => JsonEmission {
            source: ResultSource::Deterministic,
            query: None,
            results: None,
            remote_unavailable: true,
        },
    };
    println!("{}", serde_json::to_string(&emission)?);
    Ok(())
}

fn print_human(event: &SearchEvent, by_id: &HashMap<i64, &SearchableRecord>, limit: usize) {
    let (results, query, source) = match event {
        SearchEvent::RemoteUnavailable { .. } => {
            println!("remote search unavailable; showing deterministic results.");
            return;
        }
        SearchEvent::Results {
            results: None, ..
        } => {
            println!("No active search.");
            return;
        }
        SearchEvent::Results {
            results: Some(results),
            query,
            source,
        } => (results, query, source),
    };

    if let Some(query) = query {
        let chips: Vec<&str> = query.intents.iter().map(|i| i.label.as_str()).collect();
        println!("[{}] {}", source, chips.join(", "));
    }

    let shown = visible(results, limit);
    if shown.is_empty() {
        println!("No results.");
        println!();
        return;
    }

    for (i, result) in shown.iter().enumerate() {
        let (name, org) = by_id
            .get(&result.record_id)
            .map(|r| (r.name.as_str(), r.organization.as_str()))
            .unwrap_or(("(unknown)", ""));
        let name = if name.is_empty() { "(unnamed)" } else { name };
        if org.is_empty() {
            println!("{}. [{:.2}] {}", i + 1, result.score, name);
        } else {
            println!("{}. [{:.2}] {} / {}", i + 1, result.score, name, org);
        }
        for why in &result.explanations {
            println!("    {}", why);
        }
        println!("    id: {}", result.record_id);
    }
    println!();
}

/// Results worth showing: positive score, capped at `limit`.
fn visible(results: &[SearchResult], limit: usize) -> Vec<&SearchResult> {
    results
        .iter()
        .filter(|r| r.score > 0.0)
        .take(limit)
        .collect()
}
