//! vlg-schemas
//!
//! Shared record types that cross crate boundaries: raw detector findings,
//! persisted violation rows, run counters and review annotations.
//!
//! Plain data only. No IO, no matching logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder stored for an empty `function` or `details` field.
pub const NOT_AVAILABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Detector severity. Unknown severities are carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Error,
    Warning,
    Style,
    Performance,
    Portability,
    Information,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Style => "style",
            Severity::Performance => "performance",
            Severity::Portability => "portability",
            Severity::Information => "information",
            Severity::Other(s) => s.as_str(),
        }
    }

    /// Never fails. Only the exact lowercase names map to known variants; any
    /// other text, in any case, is kept verbatim in `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            "style" => Severity::Style,
            "performance" => Severity::Performance,
            "portability" => Severity::Portability,
            "information" => Severity::Information,
            _ => Severity::Other(s.to_string()),
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        Severity::parse(&s)
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Raw findings (collaborator input)
// ---------------------------------------------------------------------------

/// One finding as handed over by a detector adapter.
///
/// `function` and `details` may be empty; the store normalizes them to
/// [`NOT_AVAILABLE`]. `line_number` is `None` when the detector could not
/// attribute the finding to a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFinding {
    pub filename: String,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub line_number: Option<i64>,
    pub severity: Severity,
    pub violation_id: String,
    pub description: String,
    #[serde(default)]
    pub details: String,
}

impl RawFinding {
    pub fn new(
        filename: impl Into<String>,
        function: impl Into<String>,
        line_number: Option<i64>,
        severity: Severity,
        violation_id: impl Into<String>,
        description: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            function: function.into(),
            line_number,
            severity,
            violation_id: violation_id.into(),
            description: description.into(),
            details: details.into(),
        }
    }
}

/// Identifies one detector run: every candidate of the run shares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub detected_by: String,
    pub run_ts: DateTime<Utc>,
}

impl RunContext {
    pub fn new(detected_by: impl Into<String>, run_ts: DateTime<Utc>) -> Self {
        Self {
            detected_by: detected_by.into(),
            run_ts,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification + counters
// ---------------------------------------------------------------------------

/// Outcome of presenting one candidate to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    New,
    Updated,
    SelectError,
    InsertError,
    UpdateError,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::New => "NEW",
            Classification::Updated => "UPDATED",
            Classification::SelectError => "SELECT_ERROR",
            Classification::InsertError => "INSERT_ERROR",
            Classification::UpdateError => "UPDATE_ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Classification::SelectError | Classification::InsertError | Classification::UpdateError
        )
    }
}

/// Run-scoped counters returned from one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub new: u64,
    pub updated: u64,
    pub select_errors: u64,
    pub insert_errors: u64,
    pub update_errors: u64,
}

impl RunCounters {
    pub fn record(&mut self, c: Classification) {
        match c {
            Classification::New => self.new += 1,
            Classification::Updated => self.updated += 1,
            Classification::SelectError => self.select_errors += 1,
            Classification::InsertError => self.insert_errors += 1,
            Classification::UpdateError => self.update_errors += 1,
        }
    }

    pub fn errors(&self) -> u64 {
        self.select_errors + self.insert_errors + self.update_errors
    }

    pub fn presented(&self) -> u64 {
        self.new + self.updated + self.errors()
    }
}

/// Everything a batch caller observes about one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub detected_by: String,
    pub run_ts: DateTime<Utc>,
    pub counters: RunCounters,
    /// Rows closed as "Not Reported" at the run boundary (0 when stale marking was skipped).
    pub stale_marked: u64,
    /// Rows for the detector still waiting for a review after the run.
    pub unreviewed: u64,
}

// ---------------------------------------------------------------------------
// Review annotations
// ---------------------------------------------------------------------------

/// Human (or stale-marker) verdict stored on a violation row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReviewStatus {
    #[default]
    Unset,
    Accepted,
    Reviewed,
    NotReported,
    Other(String),
}

impl ReviewStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ReviewStatus::Unset => "",
            ReviewStatus::Accepted => "Accepted",
            ReviewStatus::Reviewed => "Reviewed",
            ReviewStatus::NotReported => "Not Reported",
            ReviewStatus::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" => ReviewStatus::Unset,
            "Accepted" => ReviewStatus::Accepted,
            "Reviewed" => ReviewStatus::Reviewed,
            "Not Reported" => ReviewStatus::NotReported,
            other => ReviewStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ReviewStatus {
    fn from(s: String) -> Self {
        ReviewStatus::parse(&s)
    }
}

impl From<ReviewStatus> for String {
    fn from(s: ReviewStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input of a human review action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewInput {
    pub status: ReviewStatus,
    #[serde(default)]
    pub analysis: String,
    pub who: String,
}

// ---------------------------------------------------------------------------
// Persisted row
// ---------------------------------------------------------------------------

/// One persisted violation. `row_id` is assigned by the store and gives the
/// stable scan order used for tie-breaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub row_id: i64,
    pub filename: String,
    pub function: String,
    pub severity: Severity,
    pub violation_id: String,
    pub description: String,
    pub details: String,
    pub line_number: Option<i64>,
    pub detected_by: String,
    pub first_report: DateTime<Utc>,
    pub last_report: DateTime<Utc>,
    pub status: ReviewStatus,
    pub analysis: String,
    pub who: String,
    pub review_date: Option<DateTime<Utc>>,
}

impl ViolationRecord {
    pub fn is_reviewed(&self) -> bool {
        self.review_date.is_some()
    }
}
