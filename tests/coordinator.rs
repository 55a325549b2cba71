//! Coordinator behaviour under debounced, out-of-order input.
//!
//! Time is paused, so debounce timers fire deterministically, and the fake
//! remote only answers when a test releases the matching oneshot sender.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use contact_search::coordinator::SearchCoordinator;
use contact_search::listener::{ChannelListener, SearchEvent};
use contact_search_core::arbiter::CoordinatorState;
use contact_search_core::models::{Dictionaries, RecordSnapshot, ResultSource, SearchableRecord};
use contact_search_core::remote::{
    RemoteIntent, RemoteResponse, RemoteSearch, RemoteUnavailable, REMOTE_MATCH_SCORE,
};

const DEBOUNCE: Duration = Duration::from_millis(200);

type Reply = Result<RemoteResponse, RemoteUnavailable>;

/// Remote whose answers are released by the test, one per query.
struct ScriptedRemote {
    calls: mpsc::UnboundedSender<String>,
    replies: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
}

impl ScriptedRemote {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (calls, calls_rx) = mpsc::unbounded_channel();
        let remote = Arc::new(Self {
            calls,
            replies: Mutex::new(HashMap::new()),
        });
        (remote, calls_rx)
    }

    /// Prepare the reply slot for `query`; send on the returned sender to
    /// resolve the call.
    fn expect(&self, query: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().insert(query.to_string(), rx);
        tx
    }
}

#[async_trait]
impl RemoteSearch for ScriptedRemote {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn call_remote(&self, raw: &str, _dictionaries: &Dictionaries) -> Reply {
        let reply = self.replies.lock().unwrap().remove(raw);
        let _ = self.calls.send(raw.to_string());
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(RemoteUnavailable::Transport("dropped".into()))),
            None => Err(RemoteUnavailable::Transport(format!("unscripted query {raw}"))),
        }
    }
}

/// Remote that answers immediately, before the caller can yield.
struct InstantRemote(RemoteResponse);

#[async_trait]
impl RemoteSearch for InstantRemote {
    fn name(&self) -> &str {
        "instant"
    }

    async fn call_remote(&self, _raw: &str, _dictionaries: &Dictionaries) -> Reply {
        Ok(self.0.clone())
    }
}

fn records() -> Vec<SearchableRecord> {
    vec![
        SearchableRecord {
            id: 1,
            name: "Ada Lovelace".into(),
            organization: "Acme Corp".into(),
            title: "Angel Investor".into(),
            warmth: 2,
            ..Default::default()
        },
        SearchableRecord {
            id: 2,
            name: "Grace Hopper".into(),
            organization: "Globex".into(),
            title: "Engineer".into(),
            warmth: 0,
            ..Default::default()
        },
        SearchableRecord {
            id: 3,
            name: "Linus Pauling".into(),
            organization: "Initech".into(),
            title: "Chemist".into(),
            warmth: 1,
            ..Default::default()
        },
    ]
}

fn snapshot() -> (RecordSnapshot, Dictionaries) {
    let snapshot = RecordSnapshot::new(records()).unwrap();
    let dictionaries = Dictionaries::from_snapshot(&snapshot);
    (snapshot, dictionaries)
}

fn coordinator(
    remote: Option<Arc<dyn RemoteSearch>>,
) -> (SearchCoordinator, mpsc::UnboundedReceiver<SearchEvent>) {
    let (snapshot, dictionaries) = snapshot();
    let (listener, rx) = ChannelListener::new();
    let coordinator =
        SearchCoordinator::new(snapshot, dictionaries, remote, Arc::new(listener), DEBOUNCE);
    (coordinator, rx)
}

fn company(label: &str) -> RemoteResponse {
    RemoteResponse {
        intents: vec![RemoteIntent {
            kind: "company".into(),
            label: label.into(),
        }],
    }
}

/// Let every runnable task finish. Time is paused, so this returns as soon
/// as the runtime is idle.
async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

fn top_id(event: &SearchEvent) -> i64 {
    match event {
        SearchEvent::Results {
            results: Some(results),
            ..
        } => results[0].record_id,
        other => panic!("expected results, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn empty_query_emits_null_results() {
    let (coordinator, mut rx) = coordinator(None);
    coordinator.input("");

    assert_eq!(
        rx.recv().await.unwrap(),
        SearchEvent::Results {
            results: None,
            query: None,
            source: ResultSource::Deterministic,
        }
    );
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
    assert!(coordinator.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn debounce_delays_the_deterministic_pass() {
    let (coordinator, mut rx) = coordinator(None);
    coordinator.input("acme");
    assert_eq!(coordinator.state(), CoordinatorState::Debouncing);

    tokio::time::sleep(DEBOUNCE - Duration::from_millis(1)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.generation(), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    let event = rx.try_recv().unwrap();
    assert_eq!(event.raw_query(), Some("acme"));
    assert_eq!(event.source(), Some(ResultSource::Deterministic));
    assert_eq!(top_id(&event), 1);
    assert_eq!(coordinator.generation(), 1);
}

#[tokio::test(start_paused = true)]
async fn without_remote_settles_idle() {
    let (coordinator, mut rx) = coordinator(None);
    coordinator.input("acme");
    let event = rx.recv().await.unwrap();

    if let SearchEvent::Results {
        results: Some(results),
        ..
    } = &event
    {
        assert_eq!(results.len(), 3);
        assert!(results[0]
            .explanations
            .iter()
            .any(|e| e.contains("organization")));
    } else {
        panic!("expected deterministic results, got {:?}", event);
    }
    assert_eq!(coordinator.state(), CoordinatorState::Idle);

    settle().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn rapid_retyping_runs_one_pass() {
    let (remote, mut calls) = ScriptedRemote::new();
    let reply = remote.expect("acme");
    let (coordinator, mut rx) = coordinator(Some(remote.clone() as Arc<dyn RemoteSearch>));

    coordinator.input("a");
    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator.input("ac");
    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator.input("acme");

    let first = rx.recv().await.unwrap();
    assert_eq!(first.raw_query(), Some("acme"));
    assert_eq!(coordinator.generation(), 1);
    assert_eq!(calls.recv().await.unwrap(), "acme");

    reply.send(Ok(company("Acme"))).unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(second.raw_query(), Some("acme"));
    assert_eq!(second.source(), Some(ResultSource::Llm));

    settle().await;
    assert!(rx.try_recv().is_err(), "no other generation may emit");
    assert!(calls.try_recv().is_err(), "only one remote call expected");
    assert_eq!(coordinator.state(), CoordinatorState::RemoteApplied);
}

#[tokio::test(start_paused = true)]
async fn remote_success_replaces_deterministic() {
    let (remote, mut calls) = ScriptedRemote::new();
    let reply = remote.expect("people who build rockets at globex");
    let (coordinator, mut rx) = coordinator(Some(remote.clone() as Arc<dyn RemoteSearch>));

    coordinator.input("people who build rockets at globex");
    let deterministic = rx.recv().await.unwrap();
    assert_eq!(deterministic.source(), Some(ResultSource::Deterministic));
    assert_eq!(coordinator.state(), CoordinatorState::RemotePending);
    calls.recv().await.unwrap();

    reply.send(Ok(company("Globex"))).unwrap();
    let event = rx.recv().await.unwrap();
    let SearchEvent::Results {
        results: Some(results),
        query: Some(query),
        source,
    } = event
    else {
        panic!("expected remote results");
    };
    assert_eq!(source, ResultSource::Llm);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].record_id, 2);
    assert_eq!(results[0].score, REMOTE_MATCH_SCORE);
    assert_eq!(results[0].explanations, vec!["matched company 'Globex'"]);
    assert_eq!(query.intents.len(), 1);
    assert!(query.intents[0].is_label_only());

    let current = coordinator.current().unwrap();
    assert_eq!(current.source, ResultSource::Llm);
    assert_eq!(current.generation, 1);
    assert_eq!(coordinator.state(), CoordinatorState::RemoteApplied);
    assert!(!coordinator.remote_unavailable());
}

#[tokio::test(start_paused = true)]
async fn deterministic_results_precede_instant_remote() {
    let remote = Arc::new(InstantRemote(company("Globex")));
    let (coordinator, mut rx) = coordinator(Some(remote as Arc<dyn RemoteSearch>));

    coordinator.input("acme");
    let first = rx.recv().await.unwrap();
    assert_eq!(first.source(), Some(ResultSource::Deterministic));
    assert_eq!(top_id(&first), 1);

    let second = rx.recv().await.unwrap();
    assert_eq!(second.source(), Some(ResultSource::Llm));
    assert_eq!(top_id(&second), 2);
    assert_eq!(second.raw_query(), Some("acme"));

    settle().await;
    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.state(), CoordinatorState::RemoteApplied);
}

#[tokio::test(start_paused = true)]
async fn late_response_from_older_generation_is_discarded() {
    let (remote, mut calls) = ScriptedRemote::new();
    let reply_acme = remote.expect("acme");
    let reply_globex = remote.expect("globex");
    let (coordinator, mut rx) = coordinator(Some(remote.clone() as Arc<dyn RemoteSearch>));

    coordinator.input("acme");
    assert_eq!(rx.recv().await.unwrap().raw_query(), Some("acme"));
    assert_eq!(calls.recv().await.unwrap(), "acme");

    coordinator.input("globex");
    assert_eq!(rx.recv().await.unwrap().raw_query(), Some("globex"));
    assert_eq!(calls.recv().await.unwrap(), "globex");
    assert_eq!(coordinator.generation(), 2);

    // g2 resolves first, g1 after it.
    reply_globex.send(Ok(company("Globex"))).unwrap();
    let event = rx.recv().await.unwrap();
    assert_eq!(event.raw_query(), Some("globex"));
    assert_eq!(event.source(), Some(ResultSource::Llm));

    reply_acme.send(Ok(company("Acme"))).unwrap();
    settle().await;
    assert!(rx.try_recv().is_err());

    let current = coordinator.current().unwrap();
    assert_eq!(current.generation, 2);
    assert_eq!(current.query.raw, "globex");
    assert_eq!(current.results[0].record_id, 2);
}

#[tokio::test(start_paused = true)]
async fn early_response_from_older_generation_is_discarded() {
    let (remote, mut calls) = ScriptedRemote::new();
    let reply_acme = remote.expect("acme");
    let _reply_globex = remote.expect("globex");
    let (coordinator, mut rx) = coordinator(Some(remote.clone() as Arc<dyn RemoteSearch>));

    coordinator.input("acme");
    rx.recv().await.unwrap();
    calls.recv().await.unwrap();

    coordinator.input("globex");
    rx.recv().await.unwrap();

    // g1 answers after g2 was minted but before g2's remote call returns.
    reply_acme.send(Ok(company("Acme"))).unwrap();
    settle().await;
    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.current().unwrap().source, ResultSource::Deterministic);
    assert_eq!(coordinator.state(), CoordinatorState::RemotePending);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_keeps_deterministic_results() {
    let (remote, mut calls) = ScriptedRemote::new();
    let reply = remote.expect("hot investors");
    let (coordinator, mut rx) = coordinator(Some(remote.clone() as Arc<dyn RemoteSearch>));

    coordinator.input("hot investors");
    rx.recv().await.unwrap();
    calls.recv().await.unwrap();
    let before = coordinator.current().unwrap();
    assert_eq!(before.results[0].record_id, 1);

    reply.send(Err(RemoteUnavailable::Status(500))).unwrap();
    assert_eq!(
        rx.recv().await.unwrap(),
        SearchEvent::RemoteUnavailable { generation: 1 }
    );

    assert_eq!(coordinator.current().unwrap(), before);
    assert!(coordinator.remote_unavailable());
    assert_eq!(coordinator.state(), CoordinatorState::DeterministicReady);

    settle().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn stale_failure_is_silent() {
    let (remote, mut calls) = ScriptedRemote::new();
    let reply_acme = remote.expect("acme");
    let _reply_globex = remote.expect("globex");
    let (coordinator, mut rx) = coordinator(Some(remote.clone() as Arc<dyn RemoteSearch>));

    coordinator.input("acme");
    rx.recv().await.unwrap();
    calls.recv().await.unwrap();
    coordinator.input("globex");
    rx.recv().await.unwrap();

    reply_acme
        .send(Err(RemoteUnavailable::Malformed("bad".into())))
        .unwrap();
    settle().await;
    assert!(rx.try_recv().is_err());
    assert!(!coordinator.remote_unavailable());
}

#[tokio::test(start_paused = true)]
async fn clear_invalidates_in_flight_remote() {
    let (remote, mut calls) = ScriptedRemote::new();
    let reply = remote.expect("acme");
    let (coordinator, mut rx) = coordinator(Some(remote.clone() as Arc<dyn RemoteSearch>));

    coordinator.input("acme");
    rx.recv().await.unwrap();
    calls.recv().await.unwrap();

    coordinator.clear();
    assert_eq!(
        rx.recv().await.unwrap(),
        SearchEvent::Results {
            results: None,
            query: None,
            source: ResultSource::Deterministic,
        }
    );
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
    assert_eq!(coordinator.generation(), 2);

    reply.send(Ok(company("Acme"))).unwrap();
    settle().await;
    assert!(rx.try_recv().is_err());
    assert!(coordinator.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn blank_input_cancels_pending_debounce() {
    let (coordinator, mut rx) = coordinator(None);
    coordinator.input("acme");
    coordinator.input("   ");

    let event = rx.recv().await.unwrap();
    assert_eq!(event.raw_query(), None);
    settle().await;
    assert!(rx.try_recv().is_err(), "cancelled timer must not fire");
}

#[tokio::test(start_paused = true)]
async fn dispose_stops_all_output() {
    let (remote, mut calls) = ScriptedRemote::new();
    let reply = remote.expect("acme");
    let (coordinator, mut rx) = coordinator(Some(remote.clone() as Arc<dyn RemoteSearch>));

    coordinator.input("acme");
    rx.recv().await.unwrap();
    calls.recv().await.unwrap();

    coordinator.dispose();
    reply.send(Ok(company("Acme"))).unwrap();
    coordinator.input("globex");
    coordinator.clear();
    settle().await;

    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.generation(), 1);
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn dispose_before_debounce_fires() {
    let (coordinator, mut rx) = coordinator(None);
    coordinator.input("acme");
    coordinator.dispose();
    settle().await;
    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.generation(), 0);
}

#[tokio::test(start_paused = true)]
async fn replaced_snapshot_is_used_for_later_passes() {
    let (coordinator, mut rx) = coordinator(None);
    let fresh = RecordSnapshot::new(vec![SearchableRecord {
        id: 42,
        name: "Katherine Johnson".into(),
        organization: "Umbrella".into(),
        ..Default::default()
    }])
    .unwrap();
    let dictionaries = Dictionaries::from_snapshot(&fresh);
    coordinator.replace_snapshot(fresh, dictionaries);

    coordinator.input("umbrella");
    let event = rx.recv().await.unwrap();
    assert_eq!(top_id(&event), 42);
}
