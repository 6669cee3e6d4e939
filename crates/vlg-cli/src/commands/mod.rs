//! Command handler modules for the `vlg` CLI.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod format;
pub mod ingest;
pub mod review;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use sqlx::PgPool;
use vlg_config::{
    load_layered_yaml, report_unused_keys, resolve_database_url, ConfigScope, UnusedKeyPolicy,
    VlgSettings,
};
use vlg_schemas::RunReport;

/// `--config` layering shared by every command that reads settings.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Layered config paths in merge order
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// Fail (instead of warn) on config keys this command does not read
    #[arg(long = "strict-config", default_value_t = false)]
    pub strict_config: bool,
}

/// Load layered config and type it. No `--config` means defaults.
pub fn load_settings(args: &ConfigArgs, scope: ConfigScope) -> Result<VlgSettings> {
    if args.config_paths.is_empty() {
        return Ok(VlgSettings::default());
    }

    let loaded = load_layered_yaml(&args.config_paths)?;

    let policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(scope, &loaded.value, policy)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS command=\"{}\" count={}",
            report.scope,
            report.unused.len()
        );
        for key in &report.unused {
            eprintln!("  unused={key}");
        }
    }

    tracing::debug!(layers = ?loaded.sources, "config loaded");
    VlgSettings::from_config_json(&loaded.value)
}

/// Connect using the env var named by settings.
pub async fn connect(settings: &VlgSettings) -> Result<PgPool> {
    let db = resolve_database_url(settings)?;
    vlg_db::connect(&db.url)
        .await
        .with_context(|| format!("database from env var {}", db.var))
}

/// RFC 3339 run timestamp, or now.
pub fn parse_run_ts(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s.trim())
            .with_context(|| format!("invalid --run-ts '{s}' (expected RFC 3339)"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

pub fn print_run_report(report: &RunReport, dry_run: bool) {
    println!("detected_by={}", report.detected_by);
    println!("run_ts={}", report.run_ts.to_rfc3339());
    println!("dry_run={}", dry_run);
    println!("new={}", report.counters.new);
    println!("updated={}", report.counters.updated);
    println!("select_errors={}", report.counters.select_errors);
    println!("insert_errors={}", report.counters.insert_errors);
    println!("update_errors={}", report.counters.update_errors);
    println!("stale_marked={}", report.stale_marked);
    println!("unreviewed={}", report.unreviewed);
}
