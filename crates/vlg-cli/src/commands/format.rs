//! `vlg format check`: run one input file through a format spec.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use vlg_config::ConfigScope;
use vlg_format::{ErrorReporter, FormatSpec, KeywordCapture, SequenceMatcher};
use vlg_schemas::{RawFinding, RunContext, RunReport};

use super::{connect, load_settings, ConfigArgs};

pub struct CheckArgs {
    pub spec: Option<String>,
    pub input: String,
    pub vars: Vec<String>,
    pub ingest: bool,
    pub detector: Option<String>,
    pub mark_stale: bool,
    pub config: ConfigArgs,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    filename: &'a str,
    spec: &'a str,
    lines_seen: usize,
    clean: bool,
    findings: &'a [RawFinding],
    captures: &'a BTreeMap<String, KeywordCapture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<RunReport>,
}

pub async fn run_check(args: CheckArgs) -> Result<()> {
    let settings = load_settings(&args.config, ConfigScope::FormatCheck)?;

    let spec_path = args
        .spec
        .or(settings.format.spec.clone())
        .context("no format spec: pass --spec or set /format/spec")?;

    let mut variables = settings.format.variables.clone();
    for kv in &args.vars {
        let (k, v) = parse_var(kv)?;
        variables.insert(k, v);
    }

    let spec_text =
        fs::read_to_string(&spec_path).with_context(|| format!("read spec failed: {spec_path}"))?;
    let spec = FormatSpec::from_text(&spec_text, &variables)
        .map_err(|e| anyhow!("{spec_path}: {e}"))?;

    let input = fs::read_to_string(&args.input)
        .with_context(|| format!("read input failed: {}", args.input))?;

    let mut matcher = SequenceMatcher::new(spec);
    matcher.check_all(input.lines())?;
    let outcome = matcher.report();

    let reporter = ErrorReporter::new(args.input.as_str())
        .with_function(settings.format.function.as_str());
    let findings = reporter.render(&outcome);

    let run = if args.ingest {
        let detector = args.detector.unwrap_or(settings.format.detector.clone());
        let ctx = RunContext::new(detector, Utc::now());
        let pool = connect(&settings).await?;
        Some(vlg_db::ingest_run(&pool, &ctx, &findings, args.mark_stale).await?)
    } else {
        None
    };

    let out = CheckOutput {
        filename: &args.input,
        spec: &spec_path,
        lines_seen: outcome.lines_seen,
        clean: outcome.is_clean(),
        findings: &findings,
        captures: &outcome.captures,
        run,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// `name=value`; the value may itself contain `=`.
fn parse_var(kv: &str) -> Result<(String, String)> {
    let (k, v) = kv
        .split_once('=')
        .with_context(|| format!("invalid --var '{kv}' (expected name=value)"))?;
    let k = k.trim();
    if k.is_empty() {
        anyhow::bail!("invalid --var '{kv}': empty name");
    }
    Ok((k.to_string(), v.to_string()))
}
