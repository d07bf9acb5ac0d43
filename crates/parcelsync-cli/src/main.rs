//! Parcelsync CLI: operator surface for the staging workflow.
//!
//! Reads configuration from the environment (see `PARCELSYNC_*`). Output is
//! JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parcelsync_cli::{
    init_tracing, load_config, log_error, parse_upload_id, resolve_user, ErrorReport,
    EXPORT_FILE,
};
use parcelsync_core::{ErrorMetadata, SyncError};
use parcelsync_services::initialize;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "parcelsync", about = "Stage, approve and roll back property data uploads")]
struct Cli {
    /// Acting user (defaults to PARCELSYNC_USER)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Storage root (defaults to PARCELSYNC_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a file for review
    Stage {
        /// Path to the file to stage
        file: PathBuf,
    },
    /// Import a file directly as approved, skipping review
    Ingest {
        /// Path to the file to import
        file: PathBuf,
    },
    /// List staged uploads
    List,
    /// Show the current state of an upload
    Status {
        /// Upload UUID
        upload_id: String,
    },
    /// Compare a staged upload with the system of record
    Diff {
        /// Upload UUID
        upload_id: String,
    },
    /// Approve a staged upload
    Approve {
        /// Upload UUID
        upload_id: String,
    },
    /// Roll back an approved upload
    Rollback {
        /// Upload UUID
        upload_id: String,
    },
    /// Show the journaled transitions of an upload
    History {
        /// Upload UUID
        upload_id: String,
    },
    /// Export all log tables as CSV
    Export {
        /// Output file, or `-` for stdout
        #[arg(long, default_value = EXPORT_FILE)]
        output: PathBuf,
    },
    /// Row counts per table
    Health,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn read_upload(file: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("{} has no file name", file.display()))?;
    Ok((filename, bytes))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.data_dir.as_deref())?;
    let workflow = initialize(&config).await?;
    let user = || resolve_user(cli.user.clone(), &config);

    match cli.command {
        Commands::Stage { file } => {
            let (filename, bytes) = read_upload(&file).await?;
            print_json(&workflow.stage(&user()?, &filename, &bytes).await?)?;
        }
        Commands::Ingest { file } => {
            let (filename, bytes) = read_upload(&file).await?;
            print_json(&workflow.ingest(&user()?, &filename, &bytes).await?)?;
        }
        Commands::List => {
            print_json(&workflow.list_staging(&user()?).await?)?;
        }
        Commands::Status { upload_id } => {
            let id = parse_upload_id(&upload_id)?;
            print_json(&workflow.status(&user()?, id).await?)?;
        }
        Commands::Diff { upload_id } => {
            let id = parse_upload_id(&upload_id)?;
            print_json(&workflow.diff(&user()?, id).await?)?;
        }
        Commands::Approve { upload_id } => {
            let id = parse_upload_id(&upload_id)?;
            let record = workflow.approve(&user()?, id).await?;
            print_json(&serde_json::json!({
                "message": "Upload approved and moved to audit log",
                "record": record.view(),
            }))?;
        }
        Commands::Rollback { upload_id } => {
            let id = parse_upload_id(&upload_id)?;
            let record = workflow.rollback(&user()?, id).await?;
            print_json(&serde_json::json!({
                "message": "Upload has been rolled back",
                "record": record.view(),
            }))?;
        }
        Commands::History { upload_id } => {
            let id = parse_upload_id(&upload_id)?;
            print_json(&workflow.history(&user()?, id).await?)?;
        }
        Commands::Export { output } => {
            let csv = workflow.export_csv(&user()?).await?;
            if output.as_os_str() == "-" {
                use std::io::Write;
                std::io::stdout()
                    .write_all(&csv)
                    .context("Failed to write export to stdout")?;
            } else {
                tokio::fs::write(&output, &csv)
                    .await
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                print_json(&serde_json::json!({
                    "output": output.display().to_string(),
                    "bytes": csv.len(),
                }))?;
            }
        }
        Commands::Health => {
            print_json(&workflow.health().await?)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<SyncError>() {
            Some(sync_err) => {
                log_error(sync_err);
                match serde_json::to_string_pretty(&ErrorReport::from_error(sync_err)) {
                    Ok(report) => eprintln!("{}", report),
                    Err(_) => eprintln!("Error: {}", sync_err.client_message()),
                }
                ExitCode::from(u8::try_from(sync_err.exit_code()).unwrap_or(1))
            }
            None => {
                eprintln!("Error: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}
