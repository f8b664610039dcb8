use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn, Dispatch, Instrument, Span};
use url::Url;

use crate::description::DescriptionFetcher;
use crate::extractor;
use crate::logging::{self, SearchLogs};
use crate::models::{
    JobRecord, SearchKey, SearchOutcome, SearchState, TerminationReason, UNKNOWN_COUNT,
};
use crate::traits::{CheckpointStore, FetchGateway, SiteConfig};

/// Knobs for one search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// "Posted within N days" filter, empty for any time
    pub days_posted: String,
    pub fetch_descriptions: bool,
    pub use_structured_extraction: bool,
    pub max_jobs: Option<usize>,
    pub max_pages: Option<u32>,
    pub delay_between_pages: Duration,
    pub delay_between_jobs: Duration,
    /// Skip descriptions and keep one record per page, to exercise pagination only
    pub pagination_test: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            days_posted: String::new(),
            fetch_descriptions: true,
            use_structured_extraction: true,
            max_jobs: None,
            max_pages: None,
            delay_between_pages: Duration::from_secs(2),
            delay_between_jobs: Duration::from_secs(1),
            pagination_test: false,
        }
    }
}

impl SearchOptions {
    fn wants_descriptions(&self) -> bool {
        !self.pagination_test && (self.fetch_descriptions || self.use_structured_extraction)
    }

    /// How many of this page's records may still be kept.
    fn page_budget(&self, state: &SearchState) -> Option<usize> {
        let remaining = state.remaining_budget(self.max_jobs);
        if self.pagination_test {
            Some(remaining.map_or(1, |left| left.min(1)))
        } else {
            remaining
        }
    }
}

enum PageStep {
    Advance(String),
    Stop(TerminationReason),
}

/// Drives a search page by page, checkpointing after each one.
#[derive(Clone)]
pub struct JobFinder {
    site: SiteConfig,
    base: Url,
    gateway: Arc<dyn FetchGateway>,
    descriptions: DescriptionFetcher,
    store: Arc<dyn CheckpointStore>,
    debug_dir: Option<PathBuf>,
    search_logs: Option<SearchLogs>,
}

impl JobFinder {
    pub fn new(
        site: SiteConfig,
        gateway: Arc<dyn FetchGateway>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self> {
        let base = Url::parse(&site.base_url)
            .with_context(|| format!("invalid site origin {}", site.base_url))?;
        info!("Initialized scraper for {}", site.base_url);

        Ok(Self {
            site,
            base,
            descriptions: DescriptionFetcher::new(Arc::clone(&gateway)),
            gateway,
            store,
            debug_dir: None,
            search_logs: None,
        })
    }

    /// Dump every fetched results page into `dir`.
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    /// Give every search its own log file on top of the console output.
    pub fn with_search_logs(mut self, logs: SearchLogs) -> Self {
        self.search_logs = Some(logs);
        self
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Run one search to completion, logging under the search's own span.
    pub async fn search(
        &self,
        job_title: &str,
        location: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome> {
        let key = SearchKey::new(job_title, location);
        let log = self.open_search_log(&key);
        // The span must belong to the subscriber that records the search.
        let span = match &log {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || {
                logging::search_span(job_title, location)
            }),
            None => logging::search_span(job_title, location),
        };
        self.run_logged(key, options, span, log).await
    }

    /// Like [`search`](Self::search) with a caller-provided span. The search's
    /// log file, if configured, is still written.
    pub async fn search_in(
        &self,
        job_title: &str,
        location: &str,
        options: &SearchOptions,
        span: Span,
    ) -> Result<SearchOutcome> {
        let key = SearchKey::new(job_title, location);
        let log = self.open_search_log(&key);
        self.run_logged(key, options, span, log).await
    }

    fn open_search_log(&self, key: &SearchKey) -> Option<Dispatch> {
        let logs = self.search_logs.as_ref()?;
        let path = logs.path(key);

        match logs.dispatch(key) {
            Ok(dispatch) => {
                tracing::dispatcher::with_default(&dispatch, || {
                    info!(
                        "Configured search log for '{}' in '{}': {}",
                        key.job_title,
                        key.location,
                        path.display()
                    );
                });
                Some(dispatch)
            }
            Err(e) => {
                warn!("Could not open search log {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn run_logged(
        &self,
        key: SearchKey,
        options: &SearchOptions,
        span: Span,
        log: Option<Dispatch>,
    ) -> Result<SearchOutcome> {
        let search = self.run(key, options).instrument(span);
        match log {
            Some(dispatch) => search.with_subscriber(dispatch).await,
            None => search.await,
        }
    }

    async fn run(&self, key: SearchKey, options: &SearchOptions) -> Result<SearchOutcome> {
        let (job_title, location) = (key.job_title.as_str(), key.location.as_str());
        let first_url = self
            .site
            .build_search_url(job_title, location, &options.days_posted);
        info!("Constructed URL: {}", first_url);
        info!("Starting job scraping for '{}' in '{}'", job_title, location);

        let mut state = SearchState::new(first_url);
        let mut pages_visited = 0;

        if options.max_pages == Some(0) {
            state.termination = Some(TerminationReason::PageLimit);
        } else if options.max_jobs == Some(0) {
            state.termination = Some(TerminationReason::JobLimit);
        }

        while state.termination.is_none() {
            pages_visited = state.page;
            let page_span = logging::page_span(state.page);
            let step = self
                .scrape_page(&mut state, &key, options)
                .instrument(page_span)
                .await?;

            match step {
                PageStep::Stop(reason) => state.termination = Some(reason),
                PageStep::Advance(next_url) => {
                    state.page += 1;
                    state.page_url = next_url;
                    info!("Moving to page {}: {}", state.page, state.page_url);
                    info!(
                        "Waiting {:?} before next request...",
                        options.delay_between_pages
                    );
                    tokio::time::sleep(options.delay_between_pages).await;
                }
            }
        }

        // The loop only exits once a reason is recorded.
        let termination = state
            .termination
            .unwrap_or(TerminationReason::PaginationComplete);
        info!(
            "Scraping complete ({}). Total jobs found: {} out of approximately {}",
            termination,
            state.records.len(),
            state.total_count
        );

        Ok(SearchOutcome {
            records: state.records,
            pages_visited,
            total_count: state.total_count,
            termination,
            key,
        })
    }

    async fn scrape_page(
        &self,
        state: &mut SearchState,
        key: &SearchKey,
        options: &SearchOptions,
    ) -> Result<PageStep> {
        info!("Scraping page {}", state.page);

        // Results pages never use structured extraction.
        let response = match self.gateway.fetch(&state.page_url, false).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to retrieve content for page {}: {}", state.page, e);
                return Ok(PageStep::Stop(TerminationReason::FetchFailure));
            }
        };
        self.dump_page("indeed", &response.body).await;

        let page = extractor::extract_page(&response.body, &self.base);
        if page.total_count != UNKNOWN_COUNT {
            state.total_count = page.total_count.clone();
        }

        if page.records.is_empty() {
            warn!(
                "No jobs extracted from page {} ({} cards found)",
                state.page, page.cards_found
            );
            return Ok(PageStep::Stop(TerminationReason::NoCardsFound));
        }

        let mut records = page.records;
        if let Some(budget) = options.page_budget(state)
            && records.len() > budget
        {
            info!(
                "Reached maximum job limit, keeping {} of {} jobs on this page",
                budget,
                records.len()
            );
            records.truncate(budget);
        }

        if options.pagination_test {
            info!("Pagination test mode enabled - skipping job descriptions");
        } else if options.wants_descriptions() {
            self.fetch_descriptions(&mut records, options).await;
        }

        info!("Successfully scraped {} jobs on page {}", records.len(), state.page);
        state.records.extend(records);

        info!("Saving progress after page {}...", state.page);
        self.store
            .persist(&state.records, key)
            .await
            .with_context(|| format!("failed to checkpoint page {}", state.page))?;

        if let Some(max_pages) = options.max_pages
            && state.page >= max_pages
        {
            info!("Reached maximum page limit of {}", max_pages);
            return Ok(PageStep::Stop(TerminationReason::PageLimit));
        }
        if let Some(max_jobs) = options.max_jobs
            && state.records.len() >= max_jobs
        {
            info!("Reached job limit of {} jobs", max_jobs);
            return Ok(PageStep::Stop(TerminationReason::JobLimit));
        }

        Ok(match page.next_page_url {
            Some(url) => PageStep::Advance(url),
            None => {
                info!("No more pages available - pagination complete");
                PageStep::Stop(TerminationReason::PaginationComplete)
            }
        })
    }

    async fn fetch_descriptions(&self, records: &mut [JobRecord], options: &SearchOptions) {
        let total = records.len();

        for (index, record) in records.iter_mut().enumerate() {
            if !record.has_url() {
                warn!("No URL for '{}', skipping description", record.title);
                continue;
            }

            info!(
                "Fetching description for: {} ({}/{})",
                record.title,
                index + 1,
                total
            );
            tokio::time::sleep(options.delay_between_jobs).await;

            let details = self
                .descriptions
                .fetch(&record.url, options.use_structured_extraction)
                .await;
            record.merge_description(
                details,
                options.fetch_descriptions,
                options.use_structured_extraction,
            );
        }
    }

    async fn dump_page(&self, label: &str, body: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };

        let path = dir.join(format!(
            "debug_{label}_{}.html",
            Local::now().format("%Y%m%d_%H%M%S_%3f")
        ));
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, body).await
        }
        .await;

        match written {
            Ok(()) => debug!("Saved HTML content to {}", path.display()),
            Err(e) => warn!("Could not save debug HTML to {}: {}", path.display(), e),
        }
    }
}
