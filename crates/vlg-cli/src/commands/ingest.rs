//! `vlg ingest`: one detector run from a JSON-lines findings file.

use anyhow::{Context, Result};
use std::fs;
use vlg_config::ConfigScope;
use vlg_reconcile::MemoryStore;
use vlg_schemas::{RawFinding, RunContext};

use super::{connect, load_settings, parse_run_ts, print_run_report, ConfigArgs};

pub struct IngestArgs {
    pub detector: Option<String>,
    pub findings_path: String,
    pub run_ts: Option<String>,
    pub no_mark_stale: bool,
    pub dry_run: bool,
    pub config: ConfigArgs,
}

pub async fn run_ingest(args: IngestArgs) -> Result<()> {
    let settings = load_settings(&args.config, ConfigScope::Ingest)?;

    let detector = args
        .detector
        .or(settings.ingest.detector.clone())
        .context("no detector: pass --detector or set /ingest/detector")?;
    let mark_stale = settings.ingest.mark_stale && !args.no_mark_stale;
    let ctx = RunContext::new(detector, parse_run_ts(args.run_ts.as_deref())?);

    let findings = read_findings(&args.findings_path)?;

    let report = if args.dry_run {
        MemoryStore::new().ingest_run(&ctx, &findings, mark_stale)
    } else {
        let pool = connect(&settings).await?;
        vlg_db::ingest_run(&pool, &ctx, &findings, mark_stale).await?
    };

    println!("findings={}", findings.len());
    print_run_report(&report, args.dry_run);
    Ok(())
}

/// One `RawFinding` JSON object per line; blank lines are skipped.
pub fn read_findings(path: &str) -> Result<Vec<RawFinding>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read findings failed: {path}"))?;
    let mut out = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let f: RawFinding = serde_json::from_str(line)
            .with_context(|| format!("{path}:{}: invalid finding", i + 1))?;
        out.push(f);
    }
    Ok(out)
}
