use chrono::{TimeZone, Utc};
use vlg_reconcile::MemoryStore;
use vlg_schemas::{Classification, RawFinding, ReviewInput, ReviewStatus, RunContext, Severity};

fn finding(line: i64) -> RawFinding {
    RawFinding::new(
        "src/io.c",
        "read_all",
        Some(line),
        Severity::Warning,
        "ignoredReturnValue",
        format!("Ignoring return value of function 'foo' (line {line})"),
        "",
    )
}

#[test]
fn line_drift_reconciles_to_one_record() {
    let mut store = MemoryStore::new();
    let t1 = RunContext::new("cppcheck", Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    let t2 = RunContext::new("cppcheck", Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());

    assert_eq!(store.insert(&finding(10), &t1), Classification::New);
    assert_eq!(store.insert(&finding(55), &t2), Classification::Updated);

    assert_eq!(store.rows().len(), 1);
    let row = &store.rows()[0];
    assert_eq!(row.line_number, Some(55));
    assert_eq!(
        row.description,
        "Ignoring return value of function 'foo' (line 55)"
    );
}

#[test]
fn accepted_status_is_preserved_across_refresh() {
    let mut store = MemoryStore::new();
    let t1 = RunContext::new("cppcheck", Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    let t2 = RunContext::new("cppcheck", Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
    let reviewed_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    store.insert(&finding(10), &t1);
    let row_id = store.rows()[0].row_id;
    assert!(store.review(
        row_id,
        &ReviewInput {
            status: ReviewStatus::Accepted,
            analysis: "return value intentionally ignored".to_string(),
            who: "jdoe".to_string(),
        },
        reviewed_at,
    ));

    assert_eq!(store.insert(&finding(15), &t2), Classification::Updated);

    let row = store.get(row_id).unwrap();
    assert_eq!(row.line_number, Some(15));
    assert_eq!(row.last_report, t2.run_ts);
    assert!(row.description.ends_with("(line 15)"));
    assert_eq!(row.status, ReviewStatus::Accepted);
    assert_eq!(row.analysis, "return value intentionally ignored");
    assert_eq!(row.who, "jdoe");
    assert_eq!(row.review_date, Some(reviewed_at));
}

#[test]
fn details_whitespace_is_collapsed_before_matching() {
    let mut store = MemoryStore::new();
    let t1 = RunContext::new("cppcheck", Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    let t2 = RunContext::new("cppcheck", Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());

    let mut a = finding(10);
    a.details = "x  =   foo();".to_string();
    let mut b = finding(10);
    b.details = "x = foo();".to_string();

    store.insert(&a, &t1);
    assert_eq!(store.insert(&b, &t2), Classification::Updated);
    assert_eq!(store.rows()[0].details, "x = foo();");
}
