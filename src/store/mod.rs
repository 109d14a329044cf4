//! store: the piece-table text store.
//!
//! Submodules:
//! - core.rs: TextStore struct, construction, read path (len/get/get_range), set, stats.
//! - edit.rs: locate/split/delete/insert/merge and the composite replace().
//! - reconcile.rs: full rewrite of the chain once dead capacity passes the threshold.
//! - swap.rs: scheduling, polling and applying the background swap (rider substitution).
//! - check.rs: check_invariants() for tests and diagnostics.
//! - shared.rs: SharedTextStore, the Mutex façade for multi-threaded callers.

pub mod core;
pub mod edit;
pub mod reconcile;
pub mod swap;
pub mod check;
pub mod shared;

pub use self::core::{StoreStats, TextStore};
pub use self::shared::SharedTextStore;
pub use self::reconcile::ReconcileSummary;
