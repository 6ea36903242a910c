//! Chronicle activity log CLI
//!
//! Operates on a SQLite-backed activity log. The HMAC key is read from the
//! environment variable named in `[signing]` (default `CHRONICLE_SIGNING_KEY`).
//!
//! Usage:
//!   chronicle record --count 20
//!   chronicle verify
//!   chronicle verify --full
//!   chronicle tamper --sequence 3
//!   chronicle purge --days 365

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chronicle_activity::{ActivityLog, ActorContext, LogOptions};
use chronicle_audit::{HmacSigner, SqliteActivityStore};
use chronicle_contracts::{
    details::{Change, SessionInfo, Target},
    error::{ChronicleError, ChronicleResult},
    verification::VerifyOptions,
};
use chronicle_policy::ChronicleConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Chronicle: tamper-evident activity log.
///
/// Every record is hash-chained to its predecessor and HMAC-signed; `verify`
/// recomputes the chain and reports the first point of divergence.
#[derive(Parser)]
#[command(
    name = "chronicle",
    about = "Tamper-evident activity log",
    long_about = "Records activity into a hash-chained, HMAC-signed log,\n\
                  verifies its integrity, and runs tamper-detection drills."
)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file. Overrides `[storage] database_path`.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append sample activity through the logging facade.
    Record {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Verify the chain and print the result as JSON. Exits 2 when broken.
    Verify {
        /// Walk every record from GENESIS instead of the recent window.
        #[arg(long)]
        full: bool,
        /// Quick-mode window size.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Corrupt one stored row to rehearse detection.
    Tamper {
        #[arg(long)]
        sequence: u64,
    },
    /// Delete records older than the given number of days.
    Purge {
        #[arg(long)]
        days: i64,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for per-record output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("chronicle: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` only when verification found a broken chain.
fn run(cli: Cli) -> ChronicleResult<bool> {
    let config = match &cli.config {
        Some(path) => ChronicleConfig::from_file(path)?,
        None => ChronicleConfig::default(),
    };
    let db_path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.storage.database_path.clone());

    let store = Arc::new(SqliteActivityStore::open(&db_path)?);

    match cli.command {
        // No key needed: this is what an attacker without one can do.
        Command::Tamper { sequence } => tamper(&store, sequence).map(|()| true),
        Command::Record { count } => record(&open_log(store, &config)?, count).map(|()| true),
        Command::Verify { full, limit } => {
            let opts = if full {
                VerifyOptions::full()
            } else {
                VerifyOptions {
                    limit,
                    ..VerifyOptions::default()
                }
            };
            let result = open_log(store, &config)?.verify_chain(&opts)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.valid)
        }
        Command::Purge { days } => {
            let age = Duration::try_days(days.max(0)).ok_or_else(|| ChronicleError::ConfigError {
                reason: format!("retention of {} days is out of range", days),
            })?;
            let cutoff = Utc::now() - age;
            let removed = open_log(store, &config)?.purge_older_than(cutoff)?;
            println!("purged {} record(s) created before {}", removed, cutoff.to_rfc3339());
            Ok(true)
        }
    }
}

fn open_log(store: Arc<SqliteActivityStore>, config: &ChronicleConfig) -> ChronicleResult<ActivityLog> {
    let signer = Arc::new(HmacSigner::from_env(
        &config.signing.primary_key_env,
        &config.signing.legacy_key_envs,
    )?);
    Ok(ActivityLog::from_config(store, signer, config))
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Cycle through the facade's entry points so the log holds a realistic mix.
fn record(log: &ActivityLog, count: usize) -> ChronicleResult<()> {
    let admin = ActorContext::user("admin-1").named("Ada").with_session(SessionInfo {
        session_id: Some("cli-session".to_string()),
        ip_address: Some("127.0.0.1".to_string()),
        user_agent: Some("chronicle-cli".to_string()),
        ..SessionInfo::default()
    });
    let support = ActorContext::user("user-7")
        .named("Grace")
        .acting_as("admin-1", Some("Ada".to_string()));

    let mut written = 0usize;
    for i in 0..count {
        let user = Target::new("user", format!("user-{i}")).named(format!("User {i}"));
        let note = Target::new("note", format!("note-{i}")).named(format!("Note {i}"));

        let wrote = match i % 5 {
            0 => log.log_create(&admin, "users", user, LogOptions::default()).map(|_| true)?,
            1 => log
                .log_update(
                    &admin,
                    "users",
                    user,
                    vec![
                        Change::set(
                            "email",
                            format!("u{i}@old.example"),
                            format!("u{i}@example.com"),
                        ),
                        Change::items("roles", vec![json!("editor")], vec![]),
                    ],
                    LogOptions::default(),
                )?
                .is_some(),
            2 => log
                .log_action(
                    &support,
                    "share",
                    "notes",
                    note,
                    LogOptions::default().with_metadata(json!({ "permission": "read" })),
                )
                .map(|_| true)?,
            3 => log.log_delete(&admin, "notes", note, LogOptions::default()).map(|_| true)?,
            _ => log.log_login_failure(
                &format!("user-{i}@example.com"),
                "invalid_password",
                Some("192.0.2.10"),
            )?,
        };
        if wrote {
            written += 1;
        }
    }

    info!(requested = count, written, "sample activity recorded");
    println!("recorded {} of {} event(s)", written, count);
    Ok(())
}

fn tamper(store: &SqliteActivityStore, sequence: u64) -> ChronicleResult<()> {
    let found = store.tamper(sequence, |record| {
        record.details.target.name = Some("tampered".to_string());
    })?;

    if !found {
        return Err(ChronicleError::StorageUnavailable {
            reason: format!("no record with sequence number {}", sequence),
        });
    }
    println!("rewrote details of record #{}; run `chronicle verify --full` to detect it", sequence);
    Ok(())
}
