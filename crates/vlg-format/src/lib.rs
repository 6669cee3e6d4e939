//! vlg-format
//!
//! Checks that a text stream contains an ordered set of expected patterns.
//!
//! - `spec`: compiles a line-oriented format description into items
//! - `matcher`: walks an input stream and records where each item matched
//! - `report`: turns a session's results into findings for the store
//!
//! Matching is synchronous and deterministic. A `SequenceMatcher` owns its
//! compiled spec and mutates it while running.

pub mod matcher;
pub mod report;
pub mod spec;

pub use matcher::{
    KeywordCapture, MatchOutcome, MatcherError, MatcherState, MissingItem, OutOfSequence,
    SequenceMatcher,
};
pub use report::{ErrorReporter, MISSING_ITEM_ID, OUT_OF_SEQUENCE_ID};
pub use spec::{FormatSpec, FormatSpecError, GroupLine, Item, Keyword, MATCH_ANYTHING};
