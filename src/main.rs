use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use pagelens::args::{Args, Command};
use pagelens::capture::{load_update_batches, CapturedPage};
use pagelens::coverage::{CoverageFilter, CoverageMonitor, CoverageType};
use pagelens::export::{export_file_name, export_report};
use pagelens::overview::OverviewController;
use pagelens::report::{print_coverage, print_overview};
use pagelens::utils::{setup_logging, validate_args};

fn configure_workers(workers: Option<usize>) -> Result<()> {
    let max_workers = workers.unwrap_or_else(|| std::cmp::min(num_cpus::get(), 8));

    rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers)
        .build_global()
        .context("Failed to configure worker pool")?;

    info!(action = "configure", component = "worker_pool", worker_count = max_workers, "Using workers for processing");
    Ok(())
}

async fn run_overview(capture: &Path, top: usize, json: bool) -> Result<()> {
    let page = CapturedPage::load(capture)?;
    let mut controller = OverviewController::new();

    match controller.start(&page).await? {
        Some(summary) if json => println!("{}", serde_json::to_string_pretty(summary)?),
        Some(summary) => print_overview(summary, capture, top),
        None => info!(action = "cancel", component = "overview", "Overview produced no summary"),
    }
    Ok(())
}

fn run_coverage(
    updates: &Path,
    filter: CoverageFilter,
    top: Option<usize>,
    export: Option<PathBuf>,
) -> Result<()> {
    let batches = load_update_batches(updates)?;
    let mut monitor = CoverageMonitor::new(filter);
    for batch in &batches {
        monitor.on_update_batch(batch);
    }

    print_coverage(&monitor, top);

    if let Some(path) = export {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create export file {:?}", path))?;
        let written = export_report(monitor.aggregator(), BufWriter::new(file))?;
        println!("\nExported {} urls to {}", written, path.display());
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Overview { capture, top, json } => run_overview(&capture, top, json).await,
        Command::Coverage {
            updates,
            filter,
            type_filter,
            content_scripts,
            top,
            export,
            export_default,
        } => {
            let filter = CoverageFilter::default()
                .with_text(&filter)?
                .with_type_mask(type_filter)
                .with_content_scripts(content_scripts);
            let export = export.or_else(|| export_default.then(|| PathBuf::from(export_file_name(Local::now()))));
            if type_filter != CoverageType::NONE {
                info!(action = "configure", component = "coverage_filter", type_filter = type_filter.label(), "Filtering coverage by type");
            }
            run_coverage(&updates, filter, top, export)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);
    validate_args(&args)?;
    configure_workers(args.workers)?;

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(action = "error", component = "main", error = %format!("{:#}", e), "Command failed");
            std::process::exit(1);
        }
    }
}
