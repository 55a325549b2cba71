//! Result delivery from the coordinator to its caller.
//!
//! The coordinator reports every change of the "current" result set through
//! a [`SearchListener`]. Listeners are invoked while the coordinator holds
//! its internal lock, so a listener must return promptly and must not call
//! back into the coordinator.

use contact_search_core::arbiter::Generation;
use contact_search_core::models::{ResultSource, SearchResult, StructuredQuery};
use tokio::sync::mpsc;

/// Receives result sets from a [`SearchCoordinator`](crate::coordinator::SearchCoordinator).
pub trait SearchListener: Send + Sync {
    /// The current result set changed.
    ///
    /// `None` results (with a `None` query) mean "no active search, show the
    /// unfiltered view".
    fn on_results(
        &self,
        results: Option<&[SearchResult]>,
        query: Option<&StructuredQuery>,
        source: ResultSource,
    );

    /// The remote call for the current generation failed. The deterministic
    /// results already delivered stay current.
    fn on_remote_unavailable(&self, _generation: Generation) {}
}

/// Owned copy of a listener callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Results {
        results: Option<Vec<SearchResult>>,
        query: Option<StructuredQuery>,
        source: ResultSource,
    },
    RemoteUnavailable {
        generation: Generation,
    },
}

impl SearchEvent {
    pub fn source(&self) -> Option<ResultSource> {
        match self {
            SearchEvent::Results { source, .. } => Some(*source),
            SearchEvent::RemoteUnavailable { .. } => None,
        }
    }

    /// Raw input of the query behind a results event.
    pub fn raw_query(&self) -> Option<&str> {
        match self {
            SearchEvent::Results {
                query: Some(query), ..
            } => Some(&query.raw),
            _ => None,
        }
    }
}

/// Forwards every callback into an unbounded tokio channel.
///
/// Used by the CLI and by tests to consume coordinator output as a stream.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<SearchEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SearchEvent) {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.tx.send(event);
    }
}

impl SearchListener for ChannelListener {
    fn on_results(
        &self,
        results: Option<&[SearchResult]>,
        query: Option<&StructuredQuery>,
        source: ResultSource,
    ) {
        self.send(SearchEvent::Results {
            results: results.map(<[SearchResult]>::to_vec),
            query: query.cloned(),
            source,
        });
    }

    fn on_remote_unavailable(&self, generation: Generation) {
        self.send(SearchEvent::RemoteUnavailable { generation });
    }
}
