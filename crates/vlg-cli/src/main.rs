use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::ConfigArgs;

#[derive(Parser)]
#[command(name = "vlg")]
#[command(about = "Violation ledger CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(flatten)]
        config: ConfigArgs,

        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Reconcile one detector run (JSON lines of findings) into the store
    Ingest {
        /// Detector name; falls back to /ingest/detector
        #[arg(long)]
        detector: Option<String>,

        /// JSON-lines file, one finding per line
        #[arg(long)]
        findings: String,

        /// Run timestamp (RFC 3339); defaults to now
        #[arg(long = "run-ts")]
        run_ts: Option<String>,

        /// Leave rows this run did not report open
        #[arg(long = "no-mark-stale", default_value_t = false)]
        no_mark_stale: bool,

        /// Reconcile against an empty in-memory store; no database access
        #[arg(long = "dry-run", default_value_t = false)]
        dry_run: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Format spec commands
    Format {
        #[command(subcommand)]
        cmd: FormatCmd,
    },

    /// Record a review verdict on one violation
    Review {
        #[arg(long = "row-id")]
        row_id: i64,

        /// Accepted | Reviewed | Not Reported | free text
        #[arg(long)]
        status: String,

        #[arg(long, default_value = "")]
        analysis: String,

        #[arg(long)]
        who: String,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Count open (unreviewed) violations for a detector
    Unreviewed {
        #[arg(long)]
        detector: String,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print violations for a detector as JSON lines
    List {
        #[arg(long)]
        detector: String,

        /// Include closed (reviewed or stale) rows
        #[arg(long, default_value_t = false)]
        all: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum FormatCmd {
    /// Check an input file against a format spec and print findings as JSON
    Check {
        /// Spec file; falls back to /format/spec
        #[arg(long)]
        spec: Option<String>,

        /// File to check
        #[arg(long)]
        input: String,

        /// Spec variable, `name=value`; overrides /format/variables
        #[arg(long = "var")]
        vars: Vec<String>,

        /// Also reconcile the findings into the database
        #[arg(long, default_value_t = false)]
        ingest: bool,

        /// Detector name for --ingest; falls back to /format/detector
        #[arg(long)]
        detector: Option<String>,

        /// With --ingest, close the detector's rows this check did not report
        #[arg(long = "mark-stale", default_value_t = false)]
        mark_stale: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev-time convenience: pick up VLG_DATABASE_URL etc. without exporting.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { config, cmd } => {
            let settings = commands::load_settings(&config, vlg_config::ConfigScope::Review)?;
            let pool = commands::connect(&settings).await?;
            match cmd {
                DbCmd::Status => {
                    let s = vlg_db::status(&pool).await?;
                    println!("db_ok={} has_violations_table={}", s.ok, s.has_violations_table);
                }
                DbCmd::Migrate => {
                    vlg_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Ingest {
            detector,
            findings,
            run_ts,
            no_mark_stale,
            dry_run,
            config,
        } => {
            commands::ingest::run_ingest(commands::ingest::IngestArgs {
                detector,
                findings_path: findings,
                run_ts,
                no_mark_stale,
                dry_run,
                config,
            })
            .await?;
        }

        Commands::Format { cmd } => match cmd {
            FormatCmd::Check {
                spec,
                input,
                vars,
                ingest,
                detector,
                mark_stale,
                config,
            } => {
                commands::format::run_check(commands::format::CheckArgs {
                    spec,
                    input,
                    vars,
                    ingest,
                    detector,
                    mark_stale,
                    config,
                })
                .await?;
            }
        },

        Commands::Review {
            row_id,
            status,
            analysis,
            who,
            config,
        } => {
            commands::review::run_review(row_id, &status, analysis, who, &config).await?;
        }

        Commands::Unreviewed { detector, config } => {
            commands::review::run_unreviewed(&detector, &config).await?;
        }

        Commands::List {
            detector,
            all,
            config,
        } => {
            commands::review::run_list(&detector, all, &config).await?;
        }
    }

    Ok(())
}
