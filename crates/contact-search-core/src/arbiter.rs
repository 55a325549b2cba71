//! Generation bookkeeping for the search coordinator.
//!
//! [`GenerationArbiter`] is the runtime-free half of the coordinator: it
//! mints generations, tracks the coordinator state, and answers the one
//! question every async completion must ask before it touches the UI,
//! "is this still the latest request?". Timers and network calls are
//! driven elsewhere; this type only records what happened.
//!
//! ```text
//! Idle ─keystroke─▶ Debouncing ─fire─▶ DeterministicReady ─remote─▶ RemotePending
//!   ▲                   │                     │                      │    │
//!   └──── empty/clear ──┘                     └──── no remote ──▶ Idle   │    │
//!                                DeterministicReady ◀── fail/stale ─────┘    │
//!                                RemoteApplied ◀────────── success ─────────┘
//! ```

/// Monotonically increasing request tag. Never reused, never decremented.
pub type Generation = u64;

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Debouncing,
    DeterministicReady,
    RemotePending,
    RemoteApplied,
}

/// Tracks the latest generation and the state it put the coordinator in.
#[derive(Debug, Clone)]
pub struct GenerationArbiter {
    latest: Generation,
    state: CoordinatorState,
    remote_unavailable: bool,
    disposed: bool,
}

impl Default for GenerationArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationArbiter {
    pub fn new() -> Self {
        Self {
            latest: 0,
            state: CoordinatorState::Idle,
            remote_unavailable: false,
            disposed: false,
        }
    }

    /// Highest generation minted so far (`0` before the first).
    pub fn latest(&self) -> Generation {
        self.latest
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Whether the latest generation's remote call failed.
    pub fn remote_unavailable(&self) -> bool {
        self.remote_unavailable
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        !self.disposed && generation == self.latest
    }

    /// Input changed; a debounce timer is (re)started.
    pub fn keystroke(&mut self) {
        if !self.disposed {
            self.state = CoordinatorState::Debouncing;
        }
    }

    /// Debounce fired: mint the next generation.
    ///
    /// Returns `None` once disposed.
    pub fn mint(&mut self) -> Option<Generation> {
        if self.disposed {
            return None;
        }
        self.latest += 1;
        self.remote_unavailable = false;
        Some(self.latest)
    }

    /// Clear the active search. Mints a generation so that every in-flight
    /// response becomes stale, and returns to `Idle`.
    pub fn clear(&mut self) -> Option<Generation> {
        let generation = self.mint()?;
        self.state = CoordinatorState::Idle;
        Some(generation)
    }

    /// Deterministic results for `generation` were emitted.
    pub fn deterministic_ready(&mut self, generation: Generation) -> bool {
        self.transition(generation, CoordinatorState::DeterministicReady)
    }

    /// The remote call for `generation` was started.
    pub fn remote_started(&mut self, generation: Generation) -> bool {
        self.transition(generation, CoordinatorState::RemotePending)
    }

    /// No remote client is configured; `generation` settles without one.
    pub fn finish_without_remote(&mut self, generation: Generation) -> bool {
        self.transition(generation, CoordinatorState::Idle)
    }

    /// A remote success arrived for `generation`.
    ///
    /// Returns `true` when the response must be applied and emitted. A
    /// success that arrives while a new keystroke is debouncing is still
    /// accepted if no newer generation has been minted, but the
    /// `Debouncing` state is left alone.
    pub fn accept_remote(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        if self.state == CoordinatorState::RemotePending {
            self.state = CoordinatorState::RemoteApplied;
        }
        true
    }

    /// The remote call for `generation` failed.
    ///
    /// Returns `true` when the failure belongs to the current generation and
    /// the "remote unavailable" indicator should be surfaced.
    pub fn remote_failed(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.remote_unavailable = true;
        if self.state == CoordinatorState::RemotePending {
            self.state = CoordinatorState::DeterministicReady;
        }
        true
    }

    /// Tear down: no further generations are minted and every pending
    /// response is discarded.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.state = CoordinatorState::Idle;
    }

    fn transition(&mut self, generation: Generation, next: CoordinatorState) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations_strictly_increase() {
        let mut arbiter = GenerationArbiter::new();
        let g1 = arbiter.mint().unwrap();
        let g2 = arbiter.mint().unwrap();
        let g3 = arbiter.clear().unwrap();
        assert!(g1 < g2 && g2 < g3);
        assert_eq!(arbiter.latest(), g3);
    }

    #[test]
    fn test_happy_path_states() {
        let mut arbiter = GenerationArbiter::new();
        assert_eq!(arbiter.state(), CoordinatorState::Idle);
        arbiter.keystroke();
        assert_eq!(arbiter.state(), CoordinatorState::Debouncing);
        let g = arbiter.mint().unwrap();
        assert!(arbiter.deterministic_ready(g));
        assert_eq!(arbiter.state(), CoordinatorState::DeterministicReady);
        assert!(arbiter.remote_started(g));
        assert_eq!(arbiter.state(), CoordinatorState::RemotePending);
        assert!(arbiter.accept_remote(g));
        assert_eq!(arbiter.state(), CoordinatorState::RemoteApplied);
    }

    #[test]
    fn test_without_remote_returns_to_idle() {
        let mut arbiter = GenerationArbiter::new();
        let g = arbiter.mint().unwrap();
        arbiter.deterministic_ready(g);
        assert!(arbiter.finish_without_remote(g));
        assert_eq!(arbiter.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_stale_success_discarded() {
        let mut arbiter = GenerationArbiter::new();
        let g1 = arbiter.mint().unwrap();
        arbiter.remote_started(g1);
        let g2 = arbiter.mint().unwrap();
        arbiter.deterministic_ready(g2);
        arbiter.remote_started(g2);

        assert!(arbiter.accept_remote(g2));
        assert!(!arbiter.accept_remote(g1));
        assert_eq!(arbiter.state(), CoordinatorState::RemoteApplied);
    }

    #[test]
    fn test_stale_failure_is_silent() {
        let mut arbiter = GenerationArbiter::new();
        let g1 = arbiter.mint().unwrap();
        let g2 = arbiter.mint().unwrap();
        arbiter.remote_started(g2);
        assert!(!arbiter.remote_failed(g1));
        assert!(!arbiter.remote_unavailable());
        assert_eq!(arbiter.state(), CoordinatorState::RemotePending);
    }

    #[test]
    fn test_current_failure_keeps_deterministic() {
        let mut arbiter = GenerationArbiter::new();
        let g = arbiter.mint().unwrap();
        arbiter.deterministic_ready(g);
        arbiter.remote_started(g);
        assert!(arbiter.remote_failed(g));
        assert!(arbiter.remote_unavailable());
        assert_eq!(arbiter.state(), CoordinatorState::DeterministicReady);

        // The indicator belongs to one generation only.
        arbiter.mint();
        assert!(!arbiter.remote_unavailable());
    }

    #[test]
    fn test_success_while_debouncing_keeps_state() {
        let mut arbiter = GenerationArbiter::new();
        let g = arbiter.mint().unwrap();
        arbiter.remote_started(g);
        arbiter.keystroke();
        assert!(arbiter.accept_remote(g));
        assert_eq!(arbiter.state(), CoordinatorState::Debouncing);
    }

    #[test]
    fn test_clear_invalidates_in_flight() {
        let mut arbiter = GenerationArbiter::new();
        let g = arbiter.mint().unwrap();
        arbiter.remote_started(g);
        arbiter.clear();
        assert_eq!(arbiter.state(), CoordinatorState::Idle);
        assert!(!arbiter.accept_remote(g));
        assert!(!arbiter.remote_failed(g));
    }

    #[test]
    fn test_dispose_stops_everything() {
        let mut arbiter = GenerationArbiter::new();
        let g = arbiter.mint().unwrap();
        arbiter.remote_started(g);
        arbiter.dispose();
        assert!(arbiter.is_disposed());
        assert!(!arbiter.accept_remote(g));
        assert_eq!(arbiter.mint(), None);
        assert_eq!(arbiter.clear(), None);
        arbiter.keystroke();
        assert_eq!(arbiter.state(), CoordinatorState::Idle);
    }
}
