//! File-backed stores for the overlays and workflow state the agents know
//! nothing about: phase labels, VS group labels, Versus records, and the
//! incremental trade-history cache.
//!
//! Every store keeps an in-memory map behind a mutex and writes the whole
//! document back atomically (temp file + rename) on each mutation. A crash
//! loses at most the in-flight write.

pub mod file;
pub mod history;
pub mod phase;
pub mod versus;
pub mod vs;

pub use history::TradeHistoryStore;
pub use phase::PhaseStore;
pub use versus::{NewVersus, VersusStore};
pub use vs::{VsStore, VsUpdateOutcome};
