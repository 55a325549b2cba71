//! Debounced search coordinator.
//!
//! Feeds keystrokes through a debounce timer, runs the deterministic path
//! synchronously when the timer fires, and races the remote path behind
//! it. Which result set is current is decided by generation number, never
//! by arrival order; the bookkeeping itself lives in
//! [`GenerationArbiter`].
//!
//! ```text
//! input ─▶ debounce ─▶ mint g ─▶ parse + execute ─▶ on_results(.., Deterministic)
//!                                  │
//!                                  └─▶ call_remote(g) ─▶ still latest? ─▶ apply ─▶ on_results(.., Llm)
//!                                                            │
//!                                                            └─ no ─▶ drop silently
//! ```
//!
//! All state sits behind one mutex and listener callbacks run while it is
//! held, so superseding a result set is a single atomic callback and the
//! deterministic emission of a generation always precedes its remote one.
//! The mutex is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use contact_search_core::arbiter::{CoordinatorState, Generation, GenerationArbiter};
use contact_search_core::models::{
    Dictionaries, RecordSnapshot, ResultSource, SearchResult, StructuredQuery,
};
use contact_search_core::remote::{self, RemoteResponse, RemoteSearch, RemoteTarget};
use contact_search_core::{parse, search};

use crate::listener::SearchListener;

/// The result set most recently delivered to the listener.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentResults {
    pub generation: Generation,
    pub query: StructuredQuery,
    pub results: Vec<SearchResult>,
    pub source: ResultSource,
}

/// Debounces input and arbitrates between the deterministic and remote paths.
///
/// Must be used from within a tokio runtime: [`input`](Self::input) spawns
/// the debounce timer and remote calls as tasks.
pub struct SearchCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    debounce: Duration,
    remote: Option<Arc<dyn RemoteSearch>>,
    listener: Arc<dyn SearchListener>,
    shared: Mutex<Shared>,
}

struct Shared {
    arbiter: GenerationArbiter,
    snapshot: RecordSnapshot,
    dictionaries: Arc<Dictionaries>,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the pending timer is replaced or cancelled. A timer
    /// that was aborted after it already woke up sees a newer ticket and
    /// does nothing.
    ticket: u64,
    current: Option<CurrentResults>,
}

impl SearchCoordinator {
    pub fn new(
        snapshot: RecordSnapshot,
        dictionaries: Dictionaries,
        remote: Option<Arc<dyn RemoteSearch>>,
        listener: Arc<dyn SearchListener>,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                debounce,
                remote,
                listener,
                shared: Mutex::new(Shared {
                    arbiter: GenerationArbiter::new(),
                    snapshot,
                    dictionaries: Arc::new(dictionaries),
                    timer: None,
                    ticket: 0,
                    current: None,
                }),
            }),
        }
    }

    /// Feed the full current text of the query box.
    ///
    /// Blank input clears immediately. Anything else (re)starts the
    /// debounce timer. A no-op once disposed.
    pub fn input(&self, raw: &str) {
        if raw.trim().is_empty() {
            self.clear();
            return;
        }

        let mut shared = self.inner.lock();
        if shared.arbiter.is_disposed() {
            return;
        }
        shared.cancel_timer();
        shared.arbiter.keystroke();
        let ticket = shared.ticket;

        let inner = Arc::clone(&self.inner);
        let raw = raw.to_string();
        shared.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            Inner::fire(&inner, ticket, raw);
        }));
    }

    /// Drop the active search and report "no active search".
    ///
    /// Pending timers are cancelled and in-flight remote calls become stale.
    pub fn clear(&self) {
        let mut shared = self.inner.lock();
        shared.cancel_timer();
        let Some(generation) = shared.arbiter.clear() else {
            return;
        };
        tracing::debug!(generation, "search cleared");
        shared.current = None;
        self.inner
            .listener
            .on_results(None, None, ResultSource::Deterministic);
    }

    /// Tear down: cancel the timer, invalidate in-flight calls, and ignore
    /// all further input. Nothing is emitted.
    pub fn dispose(&self) {
        let mut shared = self.inner.lock();
        if shared.arbiter.is_disposed() {
            return;
        }
        shared.cancel_timer();
        shared.arbiter.dispose();
        shared.current = None;
        tracing::debug!("coordinator disposed");
    }

    /// Swap the records (and their dictionaries) used by later passes.
    ///
    /// Results already delivered are left alone.
    pub fn replace_snapshot(&self, snapshot: RecordSnapshot, dictionaries: Dictionaries) {
        let mut shared = self.inner.lock();
        shared.snapshot = snapshot;
        shared.dictionaries = Arc::new(dictionaries);
    }

    /// Latest generation minted (`0` before the first debounce fires).
    pub fn generation(&self) -> Generation {
        self.inner.lock().arbiter.latest()
    }

    pub fn state(&self) -> CoordinatorState {
        self.inner.lock().arbiter.state()
    }

    /// Whether the latest generation's remote call failed.
    pub fn remote_unavailable(&self) -> bool {
        self.inner.lock().arbiter.remote_unavailable()
    }

    pub fn current(&self) -> Option<CurrentResults> {
        self.inner.lock().current.clone()
    }

    pub fn has_remote(&self) -> bool {
        self.inner.remote.is_some()
    }
}

impl Drop for SearchCoordinator {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.ticket += 1;
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Debounce fired: mint a generation, emit deterministic results, and
    /// start the remote call.
    fn fire(inner: &Arc<Inner>, ticket: u64, raw: String) {
        let mut shared = inner.lock();
        if shared.ticket != ticket {
            return;
        }
        shared.timer = None;
        let Some(generation) = shared.arbiter.mint() else {
            return;
        };

        let snapshot = shared.snapshot.clone();
        let dictionaries = Arc::clone(&shared.dictionaries);
        let query = parse::parse(&raw, &dictionaries);
        let results = search::execute(&query, snapshot.records());
        debug_assert!(search::validate_results(&results, snapshot.records()).is_ok());
        tracing::debug!(
            generation,
            intents = query.intents.len(),
            records = results.len(),
            "deterministic pass"
        );

        inner.listener.on_results(
            Some(&results),
            Some(&query),
            ResultSource::Deterministic,
        );
        shared.current = Some(CurrentResults {
            generation,
            query,
            results,
            source: ResultSource::Deterministic,
        });
        shared.arbiter.deterministic_ready(generation);

        let Some(remote) = inner.remote.clone() else {
            shared.arbiter.finish_without_remote(generation);
            return;
        };
        shared.arbiter.remote_started(generation);
        drop(shared);

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let outcome = remote.call_remote(&raw, &dictionaries).await;
            match outcome {
                Ok(response) => inner.remote_succeeded(generation, &raw, response),
                Err(err) => inner.remote_failed(generation, remote.name(), err),
            }
        });
    }

    fn remote_succeeded(&self, generation: Generation, raw: &str, response: RemoteResponse) {
        let mut shared = self.lock();
        if !shared.arbiter.accept_remote(generation) {
            tracing::debug!(
                generation,
                latest = shared.arbiter.latest(),
                "discarding stale remote response"
            );
            return;
        }

        for intent in &response.intents {
            if RemoteTarget::resolve(&intent.kind).is_none() {
                tracing::debug!(generation, kind = %intent.kind, "ignoring unknown remote intent type");
            }
        }

        let snapshot = shared.snapshot.clone();
        let query = remote::remote_query(raw, &response);
        let results = remote::apply(&response, snapshot.records());
        debug_assert!(search::validate_results(&results, snapshot.records()).is_ok());
        tracing::debug!(generation, intents = response.intents.len(), "remote results applied");

        self.listener
            .on_results(Some(&results), Some(&query), ResultSource::Llm);
        shared.current = Some(CurrentResults {
            generation,
            query,
            results,
            source: ResultSource::Llm,
        });
    }

    fn remote_failed(
        &self,
        generation: Generation,
        provider: &str,
        err: remote::RemoteUnavailable,
    ) {
        let mut shared = self.lock();
        if !shared.arbiter.remote_failed(generation) {
            tracing::debug!(generation, error = %err, "discarding stale remote failure");
            return;
        }
        tracing::warn!(generation, provider, error = %err, "remote search failed; keeping deterministic results");
        self.listener.on_remote_unavailable(generation);
    }
}
