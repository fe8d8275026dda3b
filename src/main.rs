//! Novel-Harvest main entry point
//!
//! This is the command-line interface for searching mirrors, storing
//! catalogs and downloading books.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use novel_harvest::config::{load_config_with_hash, Config};
use novel_harvest::content::{Extractor, HtmlExtractor, TitleFilter};
use novel_harvest::crawler::{
    fetch_catalog, search, DownloadJob, DownloadRequest, HttpTransport, SingleResultAcquisition,
    StopSignal, Transport,
};
use novel_harvest::output::OutputFormat;
use novel_harvest::storage::{list_tasks, open_store, ProgressPublisher, Store};
use novel_harvest::TaskStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Novel-Harvest: resilient web novel downloader
///
/// Looks novels up on a set of interchangeable mirrors, failing over
/// between them, and assembles the chapters into a text or EPUB book.
#[derive(Parser, Debug)]
#[command(name = "novel-harvest")]
#[command(version)]
#[command(about = "Resilient web novel downloader", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the mirrors for a keyword
    Search { keyword: String },

    /// Fetch and store the catalog of a search hit
    Catalog {
        keyword: String,
        /// 1-based position in the search results
        #[arg(default_value_t = 1)]
        hit: usize,
    },

    /// Download a book whose catalog is stored
    Download {
        book: String,
        /// First chapter (1-based)
        #[arg(long, default_value_t = 1)]
        start: i64,
        /// Last chapter, -1 for the end of the catalog
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        end: i64,
        /// Output format: txt or epub
        #[arg(long, default_value = "txt")]
        format: OutputFormat,
        /// Task id to publish progress under
        #[arg(long)]
        task_id: Option<String>,
    },

    /// Show the progress of a task
    Status { task_id: String },

    /// List registered tasks
    Tasks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    let config = Arc::new(config);

    let store = open_store(&config.output).context("Failed to open the document store")?;

    match cli.command {
        Command::Search { keyword } => handle_search(&config, store, &keyword).await,
        Command::Catalog { keyword, hit } => handle_catalog(&config, store, &keyword, hit).await,
        Command::Download {
            book,
            start,
            end,
            format,
            task_id,
        } => {
            let request = DownloadRequest {
                book,
                start,
                end,
                format,
                task_id,
            };
            handle_download(config, store, request).await
        }
        Command::Status { task_id } => handle_status(store.as_ref(), &task_id),
        Command::Tasks => handle_tasks(store.as_ref()),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("novel_harvest=info,warn"),
            1 => EnvFilter::new("novel_harvest=debug,info"),
            2 => EnvFilter::new("novel_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn build_transport(config: &Config) -> anyhow::Result<Arc<dyn Transport>> {
    let transport = HttpTransport::from_config(&config.http, &config.acquisition)
        .context("Failed to build HTTP client")?;
    Ok(Arc::new(transport))
}

async fn handle_search(config: &Config, store: Arc<dyn Store>, keyword: &str) -> anyhow::Result<()> {
    let acquisition = SingleResultAcquisition::from_config(config, build_transport(config)?, store)?;
    let hits = search(&acquisition, keyword)
        .await
        .with_context(|| format!("Search for '{}' failed", keyword))?;

    println!("=== {} results for '{}' ===\n", hits.len(), keyword);
    for (i, hit) in hits.iter().enumerate() {
        println!("{:>3}. {} ({})", i + 1, hit.articlename, hit.author);
        println!("     {}", hit.url_list);
    }
    Ok(())
}

async fn handle_catalog(
    config: &Config,
    store: Arc<dyn Store>,
    keyword: &str,
    hit: usize,
) -> anyhow::Result<()> {
    let acquisition = SingleResultAcquisition::from_config(config, build_transport(config)?, store)?;
    let extractor: Arc<dyn Extractor> = Arc::new(HtmlExtractor::new(
        &config.selectors,
        TitleFilter::from_config(&config.filters),
    )?);

    let catalog = fetch_catalog(&acquisition, extractor, keyword, hit)
        .await
        .with_context(|| format!("Failed to fetch the catalog of '{}'", keyword))?;

    let info = &catalog.novel_info;
    println!("=== {} ===\n", info.novel_title);
    if let Some(author) = &info.author {
        println!("Author:   {}", author);
    }
    println!("Source:   {}", info.detail_url);
    println!("Chapters: {}", info.total_chapters);
    println!("\nStored as '{}', download with: novel-harvest download '{}'", keyword, keyword);
    Ok(())
}

async fn handle_download(
    config: Arc<Config>,
    store: Arc<dyn Store>,
    request: DownloadRequest,
) -> anyhow::Result<()> {
    let transport = build_transport(&config)?;
    let job = DownloadJob::from_config(config, transport, store)?;

    let stop = StopSignal::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight chapters");
            ctrl_c_stop.raise();
        }
    });

    let report = job.run(request, stop).await?;
    let progress = &report.progress;

    println!("\n=== Task {} {} ===", progress.task_id, progress.status);
    println!(
        "Chapters: {}/{} ({}%)",
        progress.current, progress.total, progress.percentage
    );
    if let Some(output) = &report.output {
        println!("Output:   {} ({} chapters)", output.path.display(), output.chapters_written);
    }
    if !progress.failed_chapters.is_empty() {
        println!("Failed chapters ({}):", progress.failed_chapters.len());
        for url in &progress.failed_chapters {
            println!("  - {}", url);
        }
    }

    if progress.status == TaskStatus::Failed {
        bail!(
            "Download failed: {}",
            progress.message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn handle_status(store: &dyn Store, task_id: &str) -> anyhow::Result<()> {
    let Some(progress) = store.load_progress(task_id)? else {
        bail!("No progress recorded for task '{}'", task_id);
    };

    println!("Task:     {}", progress.task_id);
    println!("Status:   {}", progress.status);
    println!(
        "Progress: {}/{} ({}%)",
        progress.current, progress.total, progress.percentage
    );
    if let Some(message) = &progress.message {
        println!("Message:  {}", message);
    }
    if !progress.failed_chapters.is_empty() {
        println!("Failed:   {} chapters", progress.failed_chapters.len());
    }
    Ok(())
}

fn handle_tasks(store: &dyn Store) -> anyhow::Result<()> {
    let tasks = list_tasks(store)?;
    if tasks.is_empty() {
        println!("No tasks registered");
        return Ok(());
    }

    println!("{:<18} {:<12} {:>8}  {:<5} {}", "TASK", "STATUS", "PROGRESS", "FMT", "BOOK");
    for task in tasks {
        let (status, percentage) = match store.load_progress(&task.task_id)? {
            Some(progress) => (progress.status.to_string(), progress.percentage),
            None => ("unknown".to_string(), 0),
        };
        println!(
            "{:<18} {:<12} {:>7}%  {:<5} {}",
            task.task_id, status, percentage, task.format, task.book
        );
    }
    Ok(())
}
