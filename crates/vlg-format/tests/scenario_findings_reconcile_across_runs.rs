use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use vlg_format::*;
use vlg_reconcile::MemoryStore;
use vlg_schemas::{RunContext, Severity};

fn check(input: &[&str]) -> MatchOutcome {
    let spec = FormatSpec::from_text("alpha\nbeta\ngamma\ndelta\n", &BTreeMap::new()).unwrap();
    let mut m = SequenceMatcher::new(spec);
    m.check_all(input).unwrap();
    m.report()
}

#[test]
fn scenario_matcher_findings_behave_like_any_detector() {
    let mut store = MemoryStore::new();
    let reporter = ErrorReporter::new("docs/README.md");

    let run1 = RunContext::new("format-check", Utc.timestamp_opt(1_000, 0).unwrap());
    let out = check(&["beta", "alpha", "gamma"]);
    let c1 = reporter.forward(&out, &mut store, &run1);
    assert_eq!(c1.new, 2);
    assert_eq!(c1.errors(), 0);

    // Same problems, shifted down two lines.
    let run2 = RunContext::new("format-check", Utc.timestamp_opt(2_000, 0).unwrap());
    let out = check(&["", "", "beta", "alpha", "gamma"]);
    let c2 = reporter.forward(&out, &mut store, &run2);
    assert_eq!(c2.updated, 2);
    assert_eq!(c2.new, 0);

    assert_eq!(store.rows().len(), 2);
    let warning = store
        .rows()
        .iter()
        .find(|r| r.severity == Severity::Warning)
        .unwrap();
    assert_eq!(warning.line_number, Some(4));
    assert_eq!(warning.violation_id, OUT_OF_SEQUENCE_ID);
    assert_eq!(warning.function, "N/A");

    let missing = store
        .rows()
        .iter()
        .find(|r| r.violation_id == MISSING_ITEM_ID)
        .unwrap();
    assert_eq!(missing.description, "Missing expected item 4/4: delta");
}
