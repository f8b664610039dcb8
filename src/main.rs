use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use job_finder::checkpoint::FileCheckpointStore;
use job_finder::cli::Cli;
use job_finder::config::Config;
use job_finder::gateway::{GatewaySettings, ScrapingBeeGateway};
use job_finder::logging::SearchLogs;
use job_finder::traits::SiteConfig;
use job_finder::JobFinder;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    job_finder::logging::init(cli.debug);
    let config = Config::from_env()?;

    let titles = cli.job_titles();
    let options = cli.search_options();

    let mut settings = GatewaySettings::new(config.api_key.clone());
    settings.api_url = config.api_url.clone();
    let gateway = Arc::new(ScrapingBeeGateway::new(settings)?);
    let store = FileCheckpointStore::new(&config.data_dir);

    let site = SiteConfig::for_country(&cli.country);
    let finder = JobFinder::new(site, gateway, Arc::new(store.clone()))?
        .with_debug_dir(config.debug_dir.clone())
        .with_search_logs(SearchLogs::new(&config.log_dir, cli.debug));

    info!(
        "Starting job scraper for {} job title(s) in '{}' ({})",
        titles.len(),
        cli.location,
        finder.site().country
    );
    info!(
        "Job description fetching: {}, AI extraction: {}",
        if options.fetch_descriptions { "enabled" } else { "disabled" },
        if options.use_structured_extraction { "enabled" } else { "disabled" }
    );
    if let Some(max_jobs) = options.max_jobs {
        info!("Limited to {} jobs per search", max_jobs);
    }

    let mut total_jobs = 0;
    for title in &titles {
        info!("Searching for: '{}'", title);

        match finder.search(title, &cli.location, &options).await {
            Ok(outcome) if outcome.records.is_empty() => {
                info!("No jobs found for '{}' ({})", title, outcome.termination);
            }
            Ok(outcome) => {
                info!(
                    "Scraped {} jobs for '{}' over {} page(s) ({}); results in {} and {}",
                    outcome.records.len(),
                    title,
                    outcome.pages_visited,
                    outcome.termination,
                    store.json_path(&outcome.key).display(),
                    store.csv_path(&outcome.key).display()
                );
                total_jobs += outcome.records.len();
            }
            Err(e) => error!("Search for '{}' failed: {:#}", title, e),
        }
    }

    info!("Scraping complete. Total jobs found across all searches: {}", total_jobs);
    Ok(())
}
