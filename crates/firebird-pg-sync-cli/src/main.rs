//! firebird-pg-sync CLI - mirror Firebird databases into PostgreSQL.

use clap::{Parser, Subcommand};
use firebird_pg_sync::{Config, SyncError, SyncRunCoordinator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "firebird-pg-sync")]
#[command(about = "Full-reload replication of Firebird databases into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (default: read POSTGRES_* / FIREBIRD_* variables)
    #[arg(short, long, env = "FIREBIRD_PG_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every configured pair now
    Run,

    /// Show the sync status table of every target database
    Status,

    /// Test source and target connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(SyncError::Config)?;

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::from_env()?,
    };

    let coordinator = SyncRunCoordinator::from_config(config)?;
    let outcome = execute(&cli, &coordinator).await;
    coordinator.shutdown().await;
    outcome
}

async fn execute(cli: &Cli, coordinator: &SyncRunCoordinator) -> Result<(), SyncError> {
    match cli.command {
        Commands::Run => match coordinator.run().await {
            Ok(result) => {
                if cli.output_json {
                    println!("{}", result.to_json()?);
                } else {
                    println!("\nSync completed!");
                    println!("  Run ID: {}", result.run_id);
                    println!("  Duration: {:.2}s", result.duration_seconds);
                    for pair in &result.pairs {
                        println!(
                            "  {} -> {}: {}/{} tables, {} skipped, {} rows",
                            pair.pair_name,
                            pair.target_database,
                            pair.tables_ok,
                            pair.tables_total,
                            pair.tables_skipped,
                            pair.total_rows
                        );
                    }
                    for name in &result.skipped_pairs {
                        println!("  {}: not configured, skipped", name);
                    }
                    println!("  {}", result.headline());
                }
                Ok(())
            }
            Err(SyncError::Aggregate(agg)) => {
                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&agg)?);
                }
                Err(SyncError::Aggregate(agg))
            }
            Err(e) => Err(e),
        },

        Commands::Status => {
            let statuses = coordinator.status().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for pair in &statuses {
                    println!("{} ({}):", pair.pair_name, pair.target_database);
                    if pair.records.is_empty() {
                        println!("  no tables synced yet");
                    }
                    for record in &pair.records {
                        print!(
                            "  {:<32} {:<8} {:>10} rows  {}",
                            record.table_name,
                            record.status,
                            record.row_count,
                            record.last_sync_at.format("%Y-%m-%d %H:%M:%S")
                        );
                        match &record.error_message {
                            Some(err) => println!("  {}", err),
                            None => println!(),
                        }
                    }
                }
            }
            Ok(())
        }

        Commands::HealthCheck => {
            let report = coordinator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                for pair in &report.pairs {
                    println!("  {}:", pair.pair_name);
                    print_probe("Source (Firebird)", &pair.source);
                    print_probe("Target (PostgreSQL)", &pair.target);
                }
                println!(
                    "\n  Overall: {}",
                    if report.healthy() { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !report.healthy() {
                return Err(SyncError::connection(
                    "health check",
                    "one or more databases are unreachable",
                ));
            }
            Ok(())
        }
    }
}

fn print_probe(label: &str, probe: &firebird_pg_sync::orchestrator::ProbeResult) {
    println!("    {}: {}", label, if probe.ok { "OK" } else { "FAILED" });
    if let Some(ref err) = probe.error {
        println!("      Error: {}", err);
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
