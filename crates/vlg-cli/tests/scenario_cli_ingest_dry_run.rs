use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

const FINDINGS: &str = r#"{"filename":"src/a.c","function":"main","line_number":10,"severity":"error","violation_id":"nullPointer","description":"Null pointer dereference (line 10)"}
{"filename":"src/a.c","line_number":20,"severity":"style","violation_id":"unusedVariable","description":"Unused variable: tmp"}

{"filename":"src/a.c","function":"main","line_number":10,"severity":"error","violation_id":"nullPointer","description":"Null pointer dereference (line 10)"}
"#;

fn vlg(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vlg").unwrap();
    cmd.current_dir(dir.path())
        .env("RUST_LOG", "error")
        .env_remove("VLG_DATABASE_URL");
    cmd
}

#[test]
fn cli_ingest_dry_run_classifies_without_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");
    fs::write(&path, FINDINGS).unwrap();

    vlg(&dir)
        .args(["ingest", "--detector", "cppcheck", "--dry-run"])
        .args(["--findings", path.to_str().unwrap()])
        .args(["--run-ts", "2026-01-05T10:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("findings=3"))
        .stdout(predicate::str::contains("dry_run=true"))
        .stdout(predicate::str::contains("new=2"))
        // Exact duplicate within one run is rejected, not collapsed.
        .stdout(predicate::str::contains("insert_errors=1"))
        .stdout(predicate::str::contains("run_ts=2026-01-05T10:00:00+00:00"));
}

#[test]
fn cli_ingest_reports_bad_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");
    fs::write(&path, "{\"filename\":\"a.c\",\"severity\":\"error\",\"violation_id\":\"x\",\"description\":\"d\"}\nnot json\n").unwrap();

    vlg(&dir)
        .args(["ingest", "--detector", "cppcheck", "--dry-run"])
        .args(["--findings", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run.jsonl:2: invalid finding"));
}

#[test]
fn cli_ingest_requires_a_detector() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");
    fs::write(&path, "").unwrap();

    vlg(&dir)
        .args(["ingest", "--dry-run", "--findings", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no detector"));
}

#[test]
fn cli_db_commands_name_the_missing_url_variable() {
    let dir = tempfile::tempdir().unwrap();

    vlg(&dir)
        .args(["db", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL_MISSING"))
        .stderr(predicate::str::contains("VLG_DATABASE_URL"));
}
