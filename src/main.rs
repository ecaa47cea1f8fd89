//! Webtome main entry point
//!
//! This is the command-line interface for the webtome scraper.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use webtome::config::load_config;
use webtome::output::write_document;
use webtome::scrape::{Coordinator, JobOptions};
use webtome::{Config, ScrapeError};

/// Webtome: a web-serial scraper and assembler
///
/// Webtome discovers the chapter list of a serialized work, fetches and
/// extracts every chapter concurrently with retries, and assembles the
/// results into a single ordered HTML document.
#[derive(Parser, Debug)]
#[command(name = "webtome")]
#[command(version = "0.3.0")]
#[command(about = "Scrape a web serial into one ordered document", long_about = None)]
struct Cli {
    /// Listing page URL of the work to scrape
    #[arg(value_name = "URL")]
    url: String,

    /// Number of chapters to scrape (1-200; config default applies when omitted)
    #[arg(short, long, value_name = "N")]
    chapters: Option<u32>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Output directory for the assembled document
    #[arg(short, long, value_name = "DIR")]
    out: Option<String>,

    /// Override the title extracted from the listing page
    #[arg(long, value_name = "TITLE")]
    title: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)?
        }
        None => Config::default(),
    };
    if let Some(dir) = cli.out {
        config.output.document_dir = dir;
    }
    let document_dir = PathBuf::from(&config.output.document_dir);

    let coordinator = Arc::new(Coordinator::new(config)?);

    // First Ctrl-C requests a cooperative stop at the next batch boundary.
    let cancel = coordinator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; finishing the current batch then stopping");
            cancel.cancel();
        }
    });

    let outcome = coordinator
        .run(JobOptions {
            url: cli.url,
            limit: cli.chapters,
            title_override: cli.title,
        })
        .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(ScrapeError::Cancelled) => {
            println!("Job cancelled; no document was written.");
            return Ok(());
        }
        Err(e) => {
            tracing::error!("Job failed: {}", e);
            return Err(e.into());
        }
    };

    let path = write_document(&document_dir, &outcome.document)?;

    let summary = &outcome.summary;
    println!("\n=== {} ===", outcome.document.title);
    println!("  Chapters requested: {}", summary.requested);
    println!("  Succeeded:          {}", summary.succeeded);
    println!("  Failed:             {}", summary.failed);
    if !summary.failed_chapters.is_empty() {
        println!("\nFailed chapters:");
        for failed in &summary.failed_chapters {
            let origin = if failed.inferred { " (inferred)" } else { "" };
            println!(
                "  #{} {} [{}]{} {}",
                failed.index, failed.title, failed.reason, origin, failed.url
            );
        }
    }
    println!("\nDocument written to {}", path.display());

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webtome=info,warn"),
            1 => EnvFilter::new("webtome=debug,info"),
            2 => EnvFilter::new("webtome=trace,debug"),
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
