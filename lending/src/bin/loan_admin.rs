//! Review-queue CLI over the hosted loan table.
//!
//! Reads `LENDING_*` settings, then lists applications with their owners,
//! prints aggregate counts, or records an approve/reject decision.

use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use lending::config::ClientSettings;
use lending::domain::{AdminLoanView, LoanId, LoanStatus, LoanWorkflow};
use lending::outbound::supabase::{SupabaseClient, SupabaseLoanStore};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// `loan-admin` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "loan-admin",
    about = "Review submitted loan applications",
    version
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every application, newest first, with its owner.
    List {
        /// Emit JSON instead of aligned columns.
        #[arg(long)]
        json: bool,
    },
    /// Print total, pending and approved counts.
    Stats,
    /// Mark an application as approved.
    Approve {
        /// Application id.
        id: i64,
    },
    /// Mark an application as rejected.
    Reject {
        /// Application id.
        id: i64,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build loan-admin runtime")?;
    runtime.block_on(run(args.command))
}

async fn run(command: Command) -> Result<()> {
    let settings = ClientSettings::load_from_iter([OsString::from("loan-admin")])
        .map_err(|err| eyre!("failed to load LENDING_* settings: {err}"))?;
    let client = SupabaseClient::new(
        settings.api_url()?,
        settings.api_key()?,
        settings.request_timeout(),
    )
    .wrap_err("failed to build HTTP client")?;
    let workflow = LoanWorkflow::new(
        Arc::new(SupabaseLoanStore::new(client)),
        Arc::new(DefaultClock),
    );

    let mut out = io::stdout().lock();
    match command {
        Command::List { json } => {
            let views = workflow.list_all().await?;
            if json {
                serde_json::to_writer_pretty(&mut out, &views)?;
                writeln!(out)?;
            } else {
                for view in &views {
                    writeln!(out, "{}", queue_line(view))?;
                }
            }
        }
        Command::Stats => {
            let applications: Vec<_> = workflow
                .list_all()
                .await?
                .into_iter()
                .map(|view| view.application)
                .collect();
            let stats = workflow.compute_stats(&applications);
            writeln!(
                out,
                "total={} pending={} approved={}",
                stats.total, stats.pending_count, stats.approved_count
            )?;
        }
        Command::Approve { id } => decide(&workflow, &mut out, id, LoanStatus::Approved).await?,
        Command::Reject { id } => decide(&workflow, &mut out, id, LoanStatus::Rejected).await?,
    }
    Ok(())
}

async fn decide(
    workflow: &LoanWorkflow<SupabaseLoanStore>,
    out: &mut impl Write,
    raw_id: i64,
    status: LoanStatus,
) -> Result<()> {
    let id = LoanId::new(raw_id);
    workflow
        .set_status(id, status)
        .await
        .with_context(|| format!("failed to mark loan {id} as {status}"))?;
    writeln!(out, "loan {id} -> {status}")?;
    Ok(())
}

fn queue_line(view: &AdminLoanView) -> String {
    let application = &view.application;
    format!(
        "{id:>6}  {created}  {owner:<20}  {category:<22}  {amount:>10}  {period:<10}  {status}",
        id = application.id.get(),
        created = application.created_at.format("%Y-%m-%d %H:%M"),
        owner = view.owner_username,
        category = application.category.name(),
        amount = application.amount,
        period = application.period.to_string(),
        status = application.status,
    )
}
