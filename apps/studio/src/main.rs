use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use studio::config::Config;
use studio::generation::ServerVersion;
use studio::{LayoutManager, Session};

/// Build a flyer grid: load a project, pour a dataset into it, and save the result.
#[derive(Debug, Parser)]
#[command(name = "studio", version, about)]
struct Cli {
    /// Project document to import before anything else
    #[arg(long, value_name = "JSON")]
    project: Option<PathBuf>,

    /// CSV dataset to bulk-fill the grid with
    #[arg(long, value_name = "CSV")]
    data: Option<PathBuf>,

    /// Design model used for generation (built-in style or custom model name)
    #[arg(long)]
    model: Option<String>,

    /// Generation pipeline: v1 or v2
    #[arg(long)]
    server_version: Option<ServerVersion>,

    /// Resize the grid to this many rows
    #[arg(long)]
    rows: Option<usize>,

    /// Where to write the resulting project document
    #[arg(long, value_name = "JSON")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Studio v{}", env!("CARGO_PKG_VERSION"));

    let mut session = Session::from_config(&config, LayoutManager::default())?;

    if let Some(path) = &cli.project {
        session.load_project(path).await?;
        // Let the replay finish so later edits apply to the restored grid.
        session.settle().await;
    }

    let manager = session.manager_mut();
    if let Some(rows) = cli.rows {
        manager.set_row_count(rows)?;
    }
    if let Some(version) = cli.server_version {
        manager.set_server_version(version);
    }
    if let Some(model) = &cli.model {
        manager.set_design_model(model)?;
    }

    if let Some(path) = &cli.data {
        let queued = session.bulk_import_csv(path).await?;
        info!("Generating {queued} card(s)");
    }

    let summary = session.settle().await;
    info!(
        "Done: {} ready, {} errored, {} empty",
        summary.ready, summary.errored, summary.idle
    );

    if let Some(path) = &cli.output {
        session.save_project(path).await?;
    }

    Ok(())
}
