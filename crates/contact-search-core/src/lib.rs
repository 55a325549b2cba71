//! # Contact Search Core
//!
//! Shared, runtime-free logic for Contact Search: the searchable record
//! model, the intent parser, the deterministic scorer, the remote response
//! model and filter applier, and the generation arbiter that decides which
//! result set is current.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! native-only dependencies. Timers and network calls are driven by the
//! `contact-search` app crate.

pub mod arbiter;
pub mod models;
pub mod parse;
pub mod remote;
pub mod search;
