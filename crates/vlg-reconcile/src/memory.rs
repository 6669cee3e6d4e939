//! In-process reconciliation store.
//!
//! Holds rows in a `Vec` in ascending `row_id` order, which is also the scan
//! order used for the "first encountered" tie-break. Not internally locked:
//! callers serialize access, one run at a time.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use vlg_schemas::{
    Classification, RawFinding, ReviewInput, ReviewStatus, RunContext, RunCounters, RunReport,
    ViolationRecord,
};

use crate::engine::{select_winner, Candidate};
use crate::FindingSink;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    rows: Vec<ViolationRecord>,
    next_row_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_row_id: 1,
        }
    }

    /// Reconcile one candidate onto the stored rows.
    pub fn insert(&mut self, finding: &RawFinding, ctx: &RunContext) -> Classification {
        let candidate = Candidate::from_finding(finding, ctx);

        let pattern = match candidate.description_regex() {
            Ok(re) => re,
            Err(e) => {
                warn!(
                    filename = %candidate.filename,
                    violation_id = %candidate.violation_id,
                    "description pattern rejected: {e}"
                );
                return Classification::SelectError;
            }
        };

        let selectable: Vec<ViolationRecord> = self
            .rows
            .iter()
            .filter(|r| candidate.is_selectable(r))
            .cloned()
            .collect();

        if let Some((winner, why)) = select_winner(&selectable, &candidate, &pattern) {
            let row_id = winner.row_id;
            return match self.rows.iter_mut().find(|r| r.row_id == row_id) {
                Some(row) => {
                    candidate.refresh(row);
                    debug!(row_id, reason = ?why, "violation refreshed");
                    Classification::Updated
                }
                None => Classification::UpdateError,
            };
        }

        if self.rows.iter().any(|r| candidate.same_business_key(r)) {
            warn!(
                filename = %candidate.filename,
                violation_id = %candidate.violation_id,
                "duplicate business key within run; insert rejected"
            );
            return Classification::InsertError;
        }

        let row_id = self.next_row_id.max(1);
        self.next_row_id = row_id + 1;
        self.rows.push(candidate.to_new_record(row_id));
        debug!(row_id, "violation created");
        Classification::New
    }

    /// Close out rows the detector did not report this run and nobody has
    /// reviewed yet. Reviewed rows are never touched.
    pub fn mark_stale(&mut self, detected_by: &str, run_ts: DateTime<Utc>) -> u64 {
        let mut n = 0;
        for row in self.rows.iter_mut() {
            if row.detected_by == detected_by && row.last_report != run_ts && !row.is_reviewed() {
                row.status = ReviewStatus::NotReported;
                row.review_date = Some(run_ts);
                n += 1;
            }
        }
        n
    }

    pub fn unreviewed_count(&self, detected_by: &str) -> u64 {
        self.rows
            .iter()
            .filter(|r| r.detected_by == detected_by && !r.is_reviewed())
            .count() as u64
    }

    /// Human review action. Returns `false` when no row has `row_id`.
    pub fn review(&mut self, row_id: i64, input: &ReviewInput, at: DateTime<Utc>) -> bool {
        match self.rows.iter_mut().find(|r| r.row_id == row_id) {
            Some(row) => {
                row.status = input.status.clone();
                row.analysis = input.analysis.clone();
                row.who = input.who.clone();
                row.review_date = Some(at);
                true
            }
            None => false,
        }
    }

    /// Present one run's findings, then optionally close out what the run
    /// no longer reports.
    pub fn ingest_run<'a, I>(
        &mut self,
        ctx: &RunContext,
        findings: I,
        mark_stale: bool,
    ) -> RunReport
    where
        I: IntoIterator<Item = &'a RawFinding>,
    {
        let mut counters = RunCounters::default();
        for f in findings {
            counters.record(self.insert(f, ctx));
        }

        let stale_marked = if mark_stale {
            self.mark_stale(&ctx.detected_by, ctx.run_ts)
        } else {
            0
        };
        let unreviewed = self.unreviewed_count(&ctx.detected_by);

        if counters.errors() > 0 {
            warn!(
                detected_by = %ctx.detected_by,
                select_errors = counters.select_errors,
                insert_errors = counters.insert_errors,
                update_errors = counters.update_errors,
                "run completed with store errors"
            );
        }
        info!(
            detected_by = %ctx.detected_by,
            new = counters.new,
            updated = counters.updated,
            stale_marked,
            unreviewed,
            "run reconciled"
        );

        RunReport {
            detected_by: ctx.detected_by.clone(),
            run_ts: ctx.run_ts,
            counters,
            stale_marked,
            unreviewed,
        }
    }

    pub fn rows(&self) -> &[ViolationRecord] {
        &self.rows
    }

    pub fn get(&self, row_id: i64) -> Option<&ViolationRecord> {
        self.rows.iter().find(|r| r.row_id == row_id)
    }

    /// Rows for one detector in `row_id` order. Closed rows (any review date)
    /// are skipped unless `include_closed`.
    pub fn list(&self, detected_by: &str, include_closed: bool) -> Vec<&ViolationRecord> {
        self.rows
            .iter()
            .filter(|r| r.detected_by == detected_by && (include_closed || !r.is_reviewed()))
            .collect()
    }
}

impl FindingSink for MemoryStore {
    fn insert(&mut self, finding: &RawFinding, ctx: &RunContext) -> Classification {
        MemoryStore::insert(self, finding, ctx)
    }
}
