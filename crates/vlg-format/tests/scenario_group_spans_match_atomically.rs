use std::collections::BTreeMap;

use vlg_format::*;

fn matcher(spec: &str) -> SequenceMatcher {
    SequenceMatcher::new(FormatSpec::from_text(spec, &BTreeMap::new()).unwrap())
}

#[test]
fn scenario_group_matches_only_with_every_line_at_its_offset() {
    let mut m = matcher("begin\nend:2:\n");
    m.check_all(["noise", "begin", "middle", "end"]).unwrap();
    let out = m.report();
    assert!(out.is_clean());
    assert_eq!(m.spec().items()[0].index(), Some(1));
}

#[test]
fn scenario_group_with_misplaced_line_is_missing() {
    let mut m = matcher("begin\nend:2:\n");
    m.check_all(["begin", "end", "middle"]).unwrap();
    let out = m.report();
    assert_eq!(out.missing.len(), 1);
    assert_eq!(
        out.missing[0].raw,
        vec!["begin".to_string(), "end:2:".to_string()]
    );
}

#[test]
fn scenario_dependent_item_waits_for_its_dependency() {
    let mut m = matcher("header\nfooter :D:\n");
    m.check_all(["footer", "header", "footer"]).unwrap();
    let out = m.report();
    assert!(out.is_clean());
    assert_eq!(m.spec().items()[1].index(), Some(2));

    m.reset();
    m.check_all(["footer", "header"]).unwrap();
    let out = m.report();
    assert_eq!(out.missing.len(), 1);
    assert_eq!(out.missing[0].position, 2);
}

#[test]
fn scenario_group_at_end_of_input_matches_during_flush() {
    let mut m = matcher("one\ntwo:1:\nthree:1:\nlast\n");
    m.check_all(["one", "two", "three", "last"]).unwrap();
    let out = m.report();
    assert!(out.is_clean());
    assert_eq!(m.spec().items()[1].index(), Some(3));
}
