//! Review-side commands: `review`, `unreviewed`, `list`.

use anyhow::{bail, Result};
use chrono::Utc;
use vlg_config::ConfigScope;
use vlg_schemas::{ReviewInput, ReviewStatus};

use super::{connect, load_settings, ConfigArgs};

pub async fn run_review(
    row_id: i64,
    status: &str,
    analysis: String,
    who: String,
    config: &ConfigArgs,
) -> Result<()> {
    let status = ReviewStatus::parse(status);
    if status == ReviewStatus::Unset {
        bail!("--status must not be empty");
    }
    if who.trim().is_empty() {
        bail!("--who must not be empty");
    }

    let settings = load_settings(config, ConfigScope::Review)?;
    let pool = connect(&settings).await?;

    let input = ReviewInput {
        status,
        analysis,
        who,
    };
    if !vlg_db::review(&pool, row_id, &input, Utc::now()).await? {
        bail!("no violation with row_id={row_id}");
    }
    println!("reviewed=true row_id={} status={}", row_id, input.status);
    Ok(())
}

pub async fn run_unreviewed(detector: &str, config: &ConfigArgs) -> Result<()> {
    let settings = load_settings(config, ConfigScope::Review)?;
    let pool = connect(&settings).await?;
    let n = vlg_db::unreviewed_count(&pool, detector).await?;
    println!("detected_by={} unreviewed={}", detector, n);
    Ok(())
}

pub async fn run_list(detector: &str, all: bool, config: &ConfigArgs) -> Result<()> {
    let settings = load_settings(config, ConfigScope::Review)?;
    let pool = connect(&settings).await?;
    for row in vlg_db::list_violations(&pool, detector, all).await? {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}
