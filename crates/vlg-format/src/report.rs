//! Renders a finished matcher session into findings for the reconciliation
//! store. The matcher acts as a synthetic detector: the caller picks the
//! `detected_by` name through the `RunContext` it forwards with.

use tracing::info;
use vlg_reconcile::FindingSink;
use vlg_schemas::{RawFinding, RunContext, RunCounters, Severity};

use crate::matcher::MatchOutcome;

pub const MISSING_ITEM_ID: &str = "formatMissingItem";
pub const OUT_OF_SEQUENCE_ID: &str = "formatOutOfSequence";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReporter {
    /// File the checked input came from.
    pub filename: String,
    pub function: String,
}

impl ErrorReporter {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            function: String::new(),
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    /// Missing items first (declared order), then ordering warnings
    /// (discovered order).
    pub fn render(&self, outcome: &MatchOutcome) -> Vec<RawFinding> {
        let mut out = Vec::with_capacity(outcome.missing.len() + outcome.out_of_sequence.len());

        for m in &outcome.missing {
            let first = m.raw.first().map(String::as_str).unwrap_or("");
            out.push(RawFinding::new(
                self.filename.clone(),
                self.function.clone(),
                None,
                Severity::Error,
                MISSING_ITEM_ID,
                format!("Missing expected item {}/{}: {}", m.position, m.total, first),
                m.raw.join("\n"),
            ));
        }

        for w in &outcome.out_of_sequence {
            let line = w.line + 1;
            let raw = w.raw.first().map(String::as_str).unwrap_or("");
            out.push(RawFinding::new(
                self.filename.clone(),
                self.function.clone(),
                Some(line as i64),
                Severity::Warning,
                OUT_OF_SEQUENCE_ID,
                format!(
                    "'{raw}' out of sequence at line {line}: \
                     expected position {}/{}, actual position {}/{}",
                    w.expected_position, w.total, w.actual_position, w.total
                ),
                w.raw.join("\n"),
            ));
        }

        out
    }

    /// Push every rendered finding through `sink` as one run.
    pub fn forward<S: FindingSink + ?Sized>(
        &self,
        outcome: &MatchOutcome,
        sink: &mut S,
        ctx: &RunContext,
    ) -> RunCounters {
        let mut counters = RunCounters::default();
        for finding in self.render(outcome) {
            counters.record(sink.insert(&finding, ctx));
        }
        info!(
            filename = %self.filename,
            detected_by = %ctx.detected_by,
            new = counters.new,
            updated = counters.updated,
            errors = counters.errors(),
            "format findings forwarded"
        );
        counters
    }
}
