use std::collections::BTreeMap;

use vlg_format::*;

fn run(spec: &str, input: &[&str]) -> MatchOutcome {
    let spec = FormatSpec::from_text(spec, &BTreeMap::new()).unwrap();
    let mut m = SequenceMatcher::new(spec);
    m.check_all(input).unwrap();
    m.report()
}

#[test]
fn scenario_swapped_pair_flags_only_the_displaced_item() {
    let spec = FormatSpec::from_text("alpha\nbeta\ngamma\n", &BTreeMap::new()).unwrap();
    let mut m = SequenceMatcher::new(spec);
    m.check_all(["beta", "alpha", "gamma"]).unwrap();
    let out = m.report();

    let indexes: Vec<Option<usize>> = m.spec().items().iter().map(|i| i.index()).collect();
    assert_eq!(indexes, vec![Some(1), Some(0), Some(2)]);

    assert!(out.missing.is_empty());
    assert_eq!(out.out_of_sequence.len(), 1);
    let w = &out.out_of_sequence[0];
    assert_eq!(w.raw, vec!["alpha".to_string()]);
    assert_eq!(w.expected_position, 1);
    assert_eq!(w.actual_position, 2);
    assert_eq!(w.total, 3);
    assert_eq!(w.line, 1);
}

#[test]
fn scenario_absent_item_is_reported_missing_without_order_warnings() {
    let out = run("alpha\nbeta\ngamma\n", &["alpha", "gamma"]);

    assert!(out.out_of_sequence.is_empty());
    assert_eq!(
        out.missing,
        vec![MissingItem {
            position: 2,
            total: 3,
            raw: vec!["beta".to_string()],
        }]
    );
}

#[test]
fn scenario_empty_input_reports_every_item_missing() {
    let out = run("alpha\nbeta\ngamma\n", &[]);

    assert_eq!(out.lines_seen, 0);
    assert!(out.out_of_sequence.is_empty());
    let positions: Vec<usize> = out.missing.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[test]
fn scenario_in_order_input_is_clean() {
    let out = run("alpha\nbeta\ngamma\n", &["# alpha", "", "beta here", "gamma"]);
    assert!(out.is_clean());
    assert_eq!(out.lines_seen, 4);
}
