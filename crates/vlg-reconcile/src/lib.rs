//! vlg-reconcile
//!
//! Violation reconciliation: maps noisy, line-drifting detector output onto
//! stable rows without ever discarding review annotations.
//!
//! - `normalize`: description → line-number-insensitive pattern
//! - `engine`: candidate normalization + winner selection (pure)
//! - `memory`: in-process store implementing Insert / MarkStale / UnreviewedCount
//!
//! The Postgres store in `vlg-db` reuses `engine` and `normalize` so both
//! backends reconcile identically.

pub mod engine;
pub mod memory;
pub mod normalize;

pub use engine::{select_winner, Candidate, WinnerReason};
pub use memory::MemoryStore;
pub use normalize::{
    description_like_pattern, description_pattern, description_regex, escape_description,
    normalize_details, normalize_function,
};

use vlg_schemas::{Classification, RawFinding, RunContext};

/// Anything that accepts findings one at a time and classifies them.
///
/// Synthetic detectors (the format matcher's reporter) forward through this
/// seam instead of depending on a concrete store.
pub trait FindingSink {
    fn insert(&mut self, finding: &RawFinding, ctx: &RunContext) -> Classification;
}
