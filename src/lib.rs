//! # Contact Search
//!
//! Intent-aware search over a snapshot of contacts, combining an instant
//! deterministic path with a slower remote semantic path.
//!
//! ## Architecture
//!
//! ```text
//!                ┌────────────┐   ┌─────────────┐
//! keystrokes ──▶ │ Coordinator│──▶│ parse+score │──▶ on_results(.., deterministic)
//!                │ (debounce, │   └─────────────┘
//!                │ generation)│   ┌─────────────┐   ┌─────────┐
//!                │            │──▶│ remote call │──▶│  apply  │──▶ on_results(.., llm)
//!                └────────────┘   └─────────────┘   └─────────┘
//! ```
//!
//! The pure pieces (record model, parser, scorer, remote applier, generation
//! arbiter) live in `contact-search-core`; this crate adds configuration,
//! the HTTP remote client, the tokio coordinator, the CLI and the server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`snapshot`] | Snapshot and dictionary loading |
//! | [`remote`] | HTTP remote semantic client |
//! | [`listener`] | Result delivery contract |
//! | [`coordinator`] | Debounced, generation-arbitrated search |
//! | [`search`] | `parse` / `search` CLI commands |
//! | [`server`] | JSON HTTP server |

pub mod config;
pub mod coordinator;
pub mod listener;
pub mod remote;
pub mod search;
pub mod server;
pub mod snapshot;
