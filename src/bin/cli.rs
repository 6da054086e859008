//! bsewatch CLI
//!
//! Local entry point for fetching, watching and downloading BSE corporate
//! disclosure announcements.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bsewatch::{
    error::Result,
    models::{AnnouncementFilter, Config},
    services::{PdfDownloader, http, pdf},
    storage::{LocalCache, SnapshotCache},
    store::{AnnouncementStore, HeadlineSummarizer},
};
use clap::{Parser, Subcommand};

/// bsewatch - BSE corporate announcement watcher
#[derive(Parser, Debug)]
#[command(
    name = "bsewatch",
    version,
    about = "Resilient fetcher for BSE corporate disclosure announcements"
)]
struct Cli {
    /// Path to data directory containing config and cache files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch today's announcements once
    Fetch {
        /// Print the full record set as JSON
        #[arg(long)]
        json: bool,

        /// Case-insensitive search across company, subject and type
        #[arg(long)]
        search: Option<String>,
    },

    /// Poll for announcements on the configured interval
    Watch,

    /// Download one announcement PDF
    Download {
        /// PDF URL to fetch
        url: String,

        /// Output file name (default: derived from the URL)
        #[arg(long)]
        name: Option<String>,
    },

    /// Validate the configuration file
    Validate,

    /// Show cached snapshot info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Print a refresh result set to stdout.
fn print_announcements(store: &AnnouncementStore, filter: &AnnouncementFilter, json: bool) {
    let announcements = store.filtered(filter);

    if json {
        match serde_json::to_string_pretty(&announcements) {
            Ok(out) => println!("{out}"),
            Err(e) => log::error!("Failed to serialize announcements: {}", e),
        }
        return;
    }

    for ann in &announcements {
        println!(
            "[{}] {} ({}) - {}",
            ann.submission_date, ann.company_name, ann.announcement_type, ann.subject
        );
        if let Some(summary) = &ann.summary {
            println!("    {summary}");
        }
    }
    println!("{} announcements", announcements.len());
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.data_dir.join("bsewatch.toml");
    let config = Arc::new(Config::load_or_default(&config_path));

    match cli.command {
        Command::Fetch { json, search } => {
            let cache = Arc::new(LocalCache::new(&cli.data_dir));
            let mut store = AnnouncementStore::new(Arc::clone(&config), cache)?;
            store.seed_from_cache().await;

            let filter = AnnouncementFilter {
                search_term: search.unwrap_or_default(),
                ..AnnouncementFilter::default()
            };

            match store.refresh().await {
                Ok(count) => {
                    log::info!("Fetched {} announcements", count);
                    store.process_unprocessed(&HeadlineSummarizer);
                    print_announcements(&store, &filter, json);
                }
                Err(e) => {
                    // The composite message already explains the failure;
                    // exit directly so the raw error is not printed twice.
                    eprintln!("{}", store.format_error_message(&e));
                    if !store.announcements().is_empty() {
                        print_announcements(&store, &filter, json);
                    }
                    std::process::exit(1);
                }
            }
        }

        Command::Watch => {
            let cache = Arc::new(LocalCache::new(&cli.data_dir));
            let mut store = AnnouncementStore::new(Arc::clone(&config), cache)?;
            store.seed_from_cache().await;

            let interval = Duration::from_secs(config.poll.interval_secs);
            log::info!("Watching for announcements every {}s", interval.as_secs());

            // Refreshes are serialized: each one completes before the next
            // tick starts counting.
            loop {
                match store.refresh().await {
                    Ok(count) => {
                        log::info!("Refresh complete: {} announcements", count);
                        store.process_unprocessed(&HeadlineSummarizer);
                    }
                    Err(e) => {
                        eprintln!("{}", store.format_error_message(&e));
                    }
                }
                tokio::time::sleep(interval).await;
            }
        }

        Command::Download { url, name } => {
            let file_name = name.unwrap_or_else(|| {
                url.rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(|s| pdf::sanitize_file_name(s.trim_end_matches(".pdf"), ""))
                    .unwrap_or_else(|| "announcement.pdf".to_string())
            });

            let client = http::create_client(&config.fetcher)?;
            let downloader = PdfDownloader::new(client, &config);
            let path = downloader.download(&url, &file_name, &cli.data_dir).await?;
            log::info!("Saved {}", path.display());
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!("Config OK ({} proxies configured)", config.proxies.len());
        }

        Command::Info => {
            let cache = LocalCache::new(&cli.data_dir);
            match cache.load().await {
                Some(snapshot) => {
                    log::info!(
                        "Cached snapshot: {} announcements, saved at {}",
                        snapshot.announcements.len(),
                        snapshot.saved_at
                    );
                }
                None => log::info!("No cached snapshot found."),
            }
        }
    }

    Ok(())
}
