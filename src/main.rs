//! # ionos-reconcile
//!
//! Applies desired-state documents to IONOS Cloud and destroys them again.
//!
//! ## Usage
//!
//! ```bash
//! # Create or update every resource, write the converged state to a file
//! ionos-reconcile apply -f infra.yaml --out state.yaml
//!
//! # Delete everything recorded in a state file, last resource first
//! ionos-reconcile destroy -f state.yaml
//!
//! # Show the timeout budgets after environment overrides
//! ionos-reconcile show-timeouts
//! ```
//!
//! Credentials and tuning come from the environment, see
//! `ionoscloud_reconciler::config::engine`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ionoscloud_reconciler::config::format_duration;
use ionoscloud_reconciler::document::{render, Document, StateEntry};
use ionoscloud_reconciler::observability::{init_tracing, metrics};
use ionoscloud_reconciler::{
    Engine, EngineConfig, IonosRestClient, Operation, ResourceKind, Timeouts,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Reconcile IONOS Cloud resources from desired-state documents
#[derive(Parser)]
#[command(name = "ionos-reconcile", version = VERSION, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write Prometheus metrics in text format to this file on exit
    #[arg(long, global = true, value_name = "PATH")]
    metrics_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update every resource of a document, in document order
    Apply {
        /// Desired-state document
        #[arg(short = 'f', long = "file", value_name = "PATH")]
        file: PathBuf,

        /// Write the converged state here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Delete every resource of a state document, in reverse order
    Destroy {
        /// State document written by `apply`
        #[arg(short = 'f', long = "file", value_name = "PATH")]
        file: PathBuf,
    },
    /// Print the timeout budgets for every resource kind
    #[command(name = "show-timeouts")]
    ShowTimeouts,
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23 needs a process-wide crypto provider before any TLS use
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("Invalid configuration")?;
    init_tracing(&config)?;
    metrics::register_metrics()?;
    info!("ionos-reconcile {}", VERSION);

    let result = match cli.command {
        Commands::ShowTimeouts => {
            show_timeouts(&config);
            Ok(())
        }
        Commands::Apply { file, out } => {
            let engine = connect(&config)?;
            apply(&engine, &file, out.as_deref(), &cancel_on_interrupt()).await
        }
        Commands::Destroy { file } => {
            let engine = connect(&config)?;
            destroy(&engine, &file, &cancel_on_interrupt()).await
        }
    };

    if let Some(path) = &cli.metrics_file {
        std::fs::write(path, metrics::gather_metrics()?)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }
    result
}

fn connect(config: &EngineConfig) -> Result<Engine> {
    config.require_credentials()?;
    let client = IonosRestClient::new(config).context("Failed to create API client")?;
    Ok(Engine::new(Arc::new(client), config))
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning the in-flight call; the remote operation may still complete");
            trigger.cancel();
        }
    });
    cancel
}

async fn apply(
    engine: &Engine,
    file: &Path,
    out: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<()> {
    let document = Document::load(file)?;
    let total = document.entries().len();
    let mut ids = HashMap::new();
    let mut states = Vec::with_capacity(total);
    let mut failure = None;

    for (index, entry) in document.entries().iter().enumerate() {
        let mut resource = entry
            .resolve(&ids)
            .with_context(|| format!("Failed to resolve resource #{index}"))?;
        if let Err(e) = engine.apply(&mut resource, cancel).await {
            failure = Some(
                anyhow::Error::new(e).context(format!("Failed to apply resource #{index}")),
            );
        }
        if let (Some(name), Some(id)) = (&entry.name, resource.id()) {
            ids.insert(name.clone(), id.to_string());
        }
        states.push(StateEntry {
            name: entry.name.clone(),
            resource,
        });
        if failure.is_some() {
            break;
        }
    }

    if states.len() < total {
        warn!(
            "{} of {} resources were not applied and are missing from the written state",
            total - states.len(),
            total
        );
    }
    write_state(&states, out)?;
    failure.map_or(Ok(()), Err)
}

async fn destroy(engine: &Engine, file: &Path, cancel: &CancellationToken) -> Result<()> {
    let document = Document::load(file)?;
    let mut ids = HashMap::new();
    let mut resources = Vec::with_capacity(document.entries().len());
    for (index, entry) in document.entries().iter().enumerate() {
        let resource = entry
            .resolve(&ids)
            .with_context(|| format!("Failed to resolve resource #{index}"))?;
        if let (Some(name), Some(id)) = (&entry.name, resource.id()) {
            ids.insert(name.clone(), id.to_string());
        }
        resources.push(resource);
    }

    for resource in resources.iter().rev() {
        let Some(id) = resource.id() else {
            warn!("Skipping {} without an id, nothing to delete", resource.kind());
            continue;
        };
        engine
            .delete(id, resource, cancel)
            .await
            .with_context(|| format!("Failed to delete {} {id}", resource.kind()))?;
    }
    Ok(())
}

fn write_state(states: &[StateEntry], out: Option<&Path>) -> Result<()> {
    let rendered = render(states)?;
    match out {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write state to {}", path.display())),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}

fn show_timeouts(config: &EngineConfig) {
    println!("{:<18} {:>8} {:>8} {:>8}", "KIND", "CREATE", "UPDATE", "DELETE");
    for kind in ResourceKind::ALL {
        let timeouts = Timeouts::for_kind(kind).overridden_by(&config.timeouts);
        println!(
            "{:<18} {:>8} {:>8} {:>8}",
            kind.as_str(),
            format_duration(timeouts.budget(Operation::Create)),
            format_duration(timeouts.budget(Operation::Update)),
            format_duration(timeouts.budget(Operation::Delete)),
        );
    }
}
