//! Postgres reconciliation store.
//!
//! Matching is the same as `vlg_reconcile::MemoryStore`: rows are narrowed in
//! SQL with a `LIKE` prefilter, then `select_winner` makes the authoritative
//! full-span regex decision in Rust. Each candidate runs under its own
//! savepoint so a failed statement costs one classification, not the run.

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, PgExecutor, PgPool, Row};
use tracing::{debug, info, warn};
use vlg_reconcile::{description_like_pattern, select_winner, Candidate};
use vlg_schemas::{
    Classification, RawFinding, ReviewInput, ReviewStatus, RunContext, RunCounters, RunReport,
    Severity, ViolationRecord,
};

use crate::is_unique_constraint_violation;

const BUSINESS_KEY_INDEX: &str = "uq_violations_business_key";

/// `timestamptz` keeps microseconds. Run timestamps are compared for
/// equality against stored ones, so they are cut to the stored precision
/// before any bind.
pub fn stored_ts(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

const SELECT_COLUMNS: &str = r#"
    row_id, filename, function, severity, violation_id, description, details,
    line_number, detected_by, first_report, last_report, status, analysis, who,
    review_date
"#;

/// Reconcile one finding inside the caller's transaction.
///
/// Per-row failures come back as error classifications; only a failure to
/// open or close the savepoint is returned as `Err`.
pub async fn insert_violation(
    conn: &mut PgConnection,
    finding: &RawFinding,
    ctx: &RunContext,
) -> Result<Classification> {
    let mut candidate = Candidate::from_finding(finding, ctx);
    candidate.run_ts = stored_ts(candidate.run_ts);

    let pattern = match candidate.description_regex() {
        Ok(re) => re,
        Err(e) => {
            warn!(
                filename = %candidate.filename,
                violation_id = %candidate.violation_id,
                "description pattern rejected: {e}"
            );
            return Ok(Classification::SelectError);
        }
    };

    let mut sp = conn.begin().await.context("insert_violation savepoint failed")?;
    let class = reconcile_one(&mut sp, &candidate, &pattern).await;
    if class.is_error() {
        sp.rollback()
            .await
            .context("insert_violation savepoint rollback failed")?;
    } else {
        sp.commit()
            .await
            .context("insert_violation savepoint release failed")?;
    }
    Ok(class)
}

async fn reconcile_one(
    conn: &mut PgConnection,
    candidate: &Candidate,
    pattern: &Regex,
) -> Classification {
    let select = format!(
        r#"
        select {SELECT_COLUMNS}
        from violations
        where filename = $1
          and function = $2
          and severity = $3
          and violation_id = $4
          and detected_by = $5
          and details = $6
          and last_report <> $7
          and description like $8 escape '\'
        order by row_id
        "#
    );
    let rows = sqlx::query(&select)
        .bind(&candidate.filename)
        .bind(&candidate.function)
        .bind(candidate.severity.as_str())
        .bind(&candidate.violation_id)
        .bind(&candidate.detected_by)
        .bind(&candidate.details)
        .bind(candidate.run_ts)
        .bind(description_like_pattern(&candidate.description))
        .fetch_all(&mut *conn)
        .await;

    let decoded = rows.and_then(|rows| {
        rows.iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()
    });
    let records = match decoded {
        Ok(records) => records,
        Err(e) => {
            warn!(filename = %candidate.filename, "violation select failed: {e}");
            return Classification::SelectError;
        }
    };

    if let Some((winner, why)) = select_winner(&records, candidate, pattern) {
        let res = sqlx::query(
            r#"
            update violations
            set last_report = $2,
                description = $3,
                details = $4,
                line_number = $5
            where row_id = $1
            "#,
        )
        .bind(winner.row_id)
        .bind(candidate.run_ts)
        .bind(&candidate.description)
        .bind(&candidate.details)
        .bind(candidate.line_number)
        .execute(&mut *conn)
        .await;

        return match res {
            Ok(done) if done.rows_affected() == 1 => {
                debug!(row_id = winner.row_id, reason = ?why, "violation refreshed");
                Classification::Updated
            }
            Ok(done) => {
                warn!(
                    row_id = winner.row_id,
                    rows_affected = done.rows_affected(),
                    "violation update touched an unexpected number of rows"
                );
                Classification::UpdateError
            }
            Err(e) => {
                warn!(row_id = winner.row_id, "violation update failed: {e}");
                Classification::UpdateError
            }
        };
    }

    let res = sqlx::query(
        r#"
        insert into violations (
          filename, function, severity, violation_id, description, details,
          line_number, detected_by, first_report, last_report
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $9
        )
        "#,
    )
    .bind(&candidate.filename)
    .bind(&candidate.function)
    .bind(candidate.severity.as_str())
    .bind(&candidate.violation_id)
    .bind(&candidate.description)
    .bind(&candidate.details)
    .bind(candidate.line_number)
    .bind(&candidate.detected_by)
    .bind(candidate.run_ts)
    .execute(&mut *conn)
    .await;

    match res {
        Ok(done) if done.rows_affected() == 1 => {
            debug!(filename = %candidate.filename, "violation created");
            Classification::New
        }
        Ok(done) => {
            warn!(
                rows_affected = done.rows_affected(),
                "violation insert touched an unexpected number of rows"
            );
            Classification::InsertError
        }
        Err(e) if is_unique_constraint_violation(&e, BUSINESS_KEY_INDEX) => {
            warn!(
                filename = %candidate.filename,
                violation_id = %candidate.violation_id,
                "duplicate business key within run; insert rejected"
            );
            Classification::InsertError
        }
        Err(e) => {
            warn!(filename = %candidate.filename, "violation insert failed: {e}");
            Classification::InsertError
        }
    }
}

/// Close out rows the detector did not report this run and nobody has
/// reviewed yet.
pub async fn mark_stale(
    conn: &mut PgConnection,
    detected_by: &str,
    run_ts: DateTime<Utc>,
) -> Result<u64> {
    let done = sqlx::query(
        r#"
        update violations
        set status = $3,
            review_date = $2
        where detected_by = $1
          and last_report <> $2
          and review_date is null
        "#,
    )
    .bind(detected_by)
    .bind(stored_ts(run_ts))
    .bind(ReviewStatus::NotReported.as_str())
    .execute(conn)
    .await
    .context("mark_stale failed")?;
    Ok(done.rows_affected())
}

pub async fn unreviewed_count<'e, E: PgExecutor<'e>>(ex: E, detected_by: &str) -> Result<u64> {
    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        select count(*)::bigint
        from violations
        where detected_by = $1
          and review_date is null
        "#,
    )
    .bind(detected_by)
    .fetch_one(ex)
    .await
    .context("unreviewed_count failed")?;
    Ok(n.max(0) as u64)
}

/// Present one run's findings in a single transaction, committed once.
pub async fn ingest_run(
    pool: &PgPool,
    ctx: &RunContext,
    findings: &[RawFinding],
    close_stale: bool,
) -> Result<RunReport> {
    let ctx = &RunContext::new(ctx.detected_by.clone(), stored_ts(ctx.run_ts));
    let mut tx = pool.begin().await.context("ingest_run begin failed")?;

    let mut counters = RunCounters::default();
    for f in findings {
        counters.record(insert_violation(&mut tx, f, ctx).await?);
    }

    let stale_marked = if close_stale {
        mark_stale(&mut tx, &ctx.detected_by, ctx.run_ts).await?
    } else {
        0
    };
    let unreviewed = unreviewed_count(&mut *tx, &ctx.detected_by).await?;

    tx.commit().await.context("ingest_run commit failed")?;

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

    Ok(RunReport {
        detected_by: ctx.detected_by.clone(),
        run_ts: ctx.run_ts,
        counters,
        stale_marked,
        unreviewed,
    })
}

/// Record a human verdict. Returns `false` when no row has `row_id`.
pub async fn review(
    pool: &PgPool,
    row_id: i64,
    input: &ReviewInput,
    at: DateTime<Utc>,
) -> Result<bool> {
    let done = sqlx::query(
        r#"
        update violations
        set status = $2,
            analysis = $3,
            who = $4,
            review_date = $5
        where row_id = $1
        "#,
    )
    .bind(row_id)
    .bind(input.status.as_str())
    .bind(&input.analysis)
    .bind(&input.who)
    .bind(stored_ts(at))
    .execute(pool)
    .await
    .context("review update failed")?;
    Ok(done.rows_affected() == 1)
}

pub async fn fetch_violation(pool: &PgPool, row_id: i64) -> Result<Option<ViolationRecord>> {
    let sql = format!("select {SELECT_COLUMNS} from violations where row_id = $1");
    let row = sqlx::query(&sql)
        .bind(row_id)
        .fetch_optional(pool)
        .await
        .context("fetch_violation failed")?;
    row.as_ref()
        .map(record_from_row)
        .transpose()
        .context("fetch_violation decode failed")
}

/// Rows for one detector in `row_id` order; closed rows only with `include_closed`.
pub async fn list_violations(
    pool: &PgPool,
    detected_by: &str,
    include_closed: bool,
) -> Result<Vec<ViolationRecord>> {
    let sql = format!(
        r#"
        select {SELECT_COLUMNS}
        from violations
        where detected_by = $1
          and ($2 or review_date is null)
        order by row_id
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(detected_by)
        .bind(include_closed)
        .fetch_all(pool)
        .await
        .context("list_violations failed")?;
    rows.iter()
        .map(record_from_row)
        .collect::<Result<Vec<_>, _>>()
        .context("list_violations decode failed")
}

fn record_from_row(row: &PgRow) -> Result<ViolationRecord, sqlx::Error> {
    Ok(ViolationRecord {
        row_id: row.try_get("row_id")?,
        filename: row.try_get("filename")?,
        function: row.try_get("function")?,
        severity: Severity::parse(&row.try_get::<String, _>("severity")?),
        violation_id: row.try_get("violation_id")?,
        description: row.try_get("description")?,
        details: row.try_get("details")?,
        line_number: row.try_get("line_number")?,
        detected_by: row.try_get("detected_by")?,
        first_report: row.try_get("first_report")?,
        last_report: row.try_get("last_report")?,
        status: ReviewStatus::parse(&row.try_get::<String, _>("status")?),
        analysis: row.try_get("analysis")?,
        who: row.try_get("who")?,
        review_date: row.try_get("review_date")?,
    })
}
