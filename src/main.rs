use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use asin_tracker::application::{DispatchSettings, MessageFormatter, NotificationDispatcher, RunOrchestrator};
use asin_tracker::config::{Credentials, Settings};
use asin_tracker::domain::{RunConfig, RunMode};
use asin_tracker::infrastructure::catalog::{parse_asin_list, read_asin_lines, CatalogStore};
use asin_tracker::infrastructure::channels;
use asin_tracker::infrastructure::{FetchSettings, JsonFileStateStore, PaApiClient, ProductFetcher};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(version, about = "Detects Amazon discount and stock changes and posts them to social channels")]
#[command(group(ArgGroup::new("mode").args(["discount_only", "stock_only", "dry_run"])))]
struct Args {
    /// Only announce discount changes
    #[arg(long)]
    discount_only: bool,

    /// Only announce stock changes
    #[arg(long)]
    stock_only: bool,

    /// Detect and log, but neither post nor save the baseline
    #[arg(long)]
    dry_run: bool,

    /// Only announce products sold by Amazon itself
    #[arg(long)]
    amazon_only: bool,

    /// Minimum discount percentage worth announcing (overrides the catalog)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    min_discount: Option<u8>,

    /// Settings file (default: Tracker.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Catalog file (overrides settings)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Baseline state file (overrides settings)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Comma-separated ASINs to add to the catalog, then exit
    #[arg(long, value_name = "ASINS")]
    add: Option<String>,

    /// File with one ASIN per line to add to the catalog, then exit
    #[arg(long, value_name = "PATH")]
    add_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json_summary: bool,
}

impl Args {
    fn mode(&self) -> RunMode {
        if self.discount_only {
            RunMode::DiscountOnly
        } else if self.stock_only {
            RunMode::StockOnly
        } else if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::All
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn add_to_catalog(store: &CatalogStore, args: &Args) -> Result<()> {
    let mut candidates = Vec::new();
    if let Some(list) = &args.add {
        candidates.extend(parse_asin_list(list));
    }
    if let Some(path) = &args.add_file {
        candidates.extend(read_asin_lines(path)?);
    }

    let added = store.add(&candidates)?;
    info!(
        path = %store.path().display(),
        requested = candidates.len(),
        added = added.len(),
        "Catalog updated"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_format);

    // Priority: CLI args > settings file > defaults
    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(path) = &args.catalog {
        settings.catalog_path = path.clone();
    }
    if let Some(path) = &args.state {
        settings.state_path = path.clone();
    }

    let catalog_store = CatalogStore::new(&settings.catalog_path);
    if args.add.is_some() || args.add_file.is_some() {
        add_to_catalog(&catalog_store, &args)?;
        return Ok(ExitCode::SUCCESS);
    }

    let credentials = Credentials::from_env()?;
    let marketplace_credentials = credentials.marketplace()?;
    let catalog = catalog_store.load()?;

    // Priority: CLI args > catalog file > defaults
    let config = RunConfig {
        mode: args.mode(),
        amazon_only: args.amazon_only || catalog.amazon_only.unwrap_or(false),
        min_discount_percent: args
            .min_discount
            .or(catalog.min_discount_percent)
            .unwrap_or(0),
    };

    let api = PaApiClient::new(&settings.marketplace, &marketplace_credentials)?;
    let fetcher = ProductFetcher::new(Arc::new(api), FetchSettings::from(&settings.marketplace));

    let channels = channels::from_credentials(&credentials, &settings.threads, settings.marketplace.timeout())?;
    if channels.is_empty() {
        warn!("No notification channel has complete credentials");
    }
    let formatter = MessageFormatter::new(
        settings.marketplace.marketplace.clone(),
        marketplace_credentials.partner_tag.clone(),
        settings.dispatch.hashtags.clone(),
    );
    let dispatcher = NotificationDispatcher::new(channels, formatter, DispatchSettings::from(&settings.dispatch));

    let store = Arc::new(JsonFileStateStore::new(&settings.state_path));
    let mut orchestrator = RunOrchestrator::new(fetcher, store, dispatcher, config);
    let summary = orchestrator.run(&catalog).await;

    if args.json_summary {
        println!("{}", summary.to_json()?);
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
