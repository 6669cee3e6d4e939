use chrono::{DateTime, Utc};
use regex::Regex;
use vlg_schemas::{RawFinding, RunContext, Severity, ViolationRecord};

use crate::normalize::{description_regex, normalize_details, normalize_function};

/// A finding after field normalization, bound to the run presenting it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub filename: String,
    pub function: String,
    pub severity: Severity,
    pub violation_id: String,
    pub description: String,
    pub details: String,
    pub line_number: Option<i64>,
    pub detected_by: String,
    pub run_ts: DateTime<Utc>,
}

impl Candidate {
    pub fn from_finding(f: &RawFinding, ctx: &RunContext) -> Self {
        Self {
            filename: f.filename.clone(),
            function: normalize_function(&f.function),
            severity: f.severity.clone(),
            violation_id: f.violation_id.clone(),
            description: f.description.clone(),
            details: normalize_details(&f.details),
            line_number: f.line_number,
            detected_by: ctx.detected_by.clone(),
            run_ts: ctx.run_ts,
        }
    }

    /// Full-span matcher for stored descriptions with line numbers wildcarded.
    pub fn description_regex(&self) -> Result<Regex, regex::Error> {
        description_regex(&self.description)
    }

    /// Selection predicate: same identity fields and not already refreshed by
    /// this run.
    ///
    /// Rows touched earlier in the same run are excluded, so an identical
    /// second candidate in one run never updates the row the first one
    /// refreshed.
    pub fn is_selectable(&self, row: &ViolationRecord) -> bool {
        row.filename == self.filename
            && row.function == self.function
            && row.severity == self.severity
            && row.violation_id == self.violation_id
            && row.detected_by == self.detected_by
            && row.details == self.details
            && row.last_report != self.run_ts
    }

    /// Exact business-key equality, used for the uniqueness check on insert.
    pub fn same_business_key(&self, row: &ViolationRecord) -> bool {
        row.filename == self.filename
            && row.function == self.function
            && row.severity == self.severity
            && row.violation_id == self.violation_id
            && row.detected_by == self.detected_by
            && row.description == self.description
            && row.details == self.details
            && row.line_number == self.line_number
    }

    /// Fresh row for a candidate nothing matched. Review fields start empty.
    pub fn to_new_record(&self, row_id: i64) -> ViolationRecord {
        ViolationRecord {
            row_id,
            filename: self.filename.clone(),
            function: self.function.clone(),
            severity: self.severity.clone(),
            violation_id: self.violation_id.clone(),
            description: self.description.clone(),
            details: self.details.clone(),
            line_number: self.line_number,
            detected_by: self.detected_by.clone(),
            first_report: self.run_ts,
            last_report: self.run_ts,
            status: Default::default(),
            analysis: String::new(),
            who: String::new(),
            review_date: None,
        }
    }

    /// Refresh a matched row. Review fields are left alone.
    pub fn refresh(&self, row: &mut ViolationRecord) {
        row.last_report = self.run_ts;
        row.description = self.description.clone();
        row.details = self.details.clone();
        row.line_number = self.line_number;
    }
}

/// Which preference picked the winning row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WinnerReason {
    /// Stored line number equals the candidate's and line numbers are unambiguous.
    LineNumber,
    /// Line numbers are ambiguous; stored description equals the candidate's verbatim.
    VerbatimDescription,
    /// Neither preference applied; first row in scan order.
    FirstEncountered,
}

/// Pick the row a candidate reconciles onto.
///
/// `rows` must already satisfy [`Candidate::is_selectable`] and be in stable
/// scan order (ascending `row_id`); the final fallback depends on that order.
/// Rows whose stored description does not fully match `pattern` are ignored.
/// Returns `None` when nothing matches, meaning the candidate is new.
pub fn select_winner<'a>(
    rows: &'a [ViolationRecord],
    candidate: &Candidate,
    pattern: &Regex,
) -> Option<(&'a ViolationRecord, WinnerReason)> {
    let matching: Vec<&ViolationRecord> = rows
        .iter()
        .filter(|r| pattern.is_match(&r.description))
        .collect();

    let first = *matching.first()?;

    // Two rows on the same stored line make the line number useless as a
    // tie-break.
    let match_line_number = !has_duplicate_line(&matching);

    for row in &matching {
        if match_line_number {
            if row.line_number == candidate.line_number {
                return Some((row, WinnerReason::LineNumber));
            }
        } else if row.description == candidate.description {
            return Some((row, WinnerReason::VerbatimDescription));
        }
    }

    Some((first, WinnerReason::FirstEncountered))
}

fn has_duplicate_line(rows: &[&ViolationRecord]) -> bool {
    for (i, a) in rows.iter().enumerate() {
        if rows[i + 1..].iter().any(|b| b.line_number == a.line_number) {
            return true;
        }
    }
    false
}
