use std::time::Duration;

use clap::Parser;

use crate::job_finder::SearchOptions;

/// Titles searched when none are given on the command line.
pub const DEFAULT_JOB_TITLES: &[&str] = &[
    "junior ai engineer",
    "junior data engineer",
    "junior data scientist",
    "graduate data engineer",
    "graduate data scientist",
];

#[derive(Debug, Parser)]
#[command(name = "job-finder")]
#[command(about = "Indeed job scraper using the ScrapingBee rendering API")]
pub struct Cli {
    /// Single job title to search for
    #[arg(long)]
    pub job: Option<String>,

    /// Multiple job titles to search for
    #[arg(long, num_args = 1..)]
    pub jobs: Option<Vec<String>>,

    /// Use the default list of job titles
    #[arg(long)]
    pub use_default_jobs: bool,

    /// Only junior positions from the default list
    #[arg(long)]
    pub junior_only: bool,

    /// Only graduate positions from the default list
    #[arg(long, conflicts_with = "junior_only")]
    pub graduate_only: bool,

    /// Location to search in
    #[arg(long, default_value = "london")]
    pub location: String,

    /// Only jobs posted within this many days
    #[arg(long, default_value = "")]
    pub days: String,

    /// Country code selecting the site (uk, us)
    #[arg(long, default_value = "uk")]
    pub country: String,

    /// Seconds between results page requests
    #[arg(long, default_value_t = 2)]
    pub delay_pages: u64,

    /// Seconds between job description requests
    #[arg(long, default_value_t = 1)]
    pub delay_jobs: u64,

    /// Do not fetch job descriptions
    #[arg(long)]
    pub no_descriptions: bool,

    /// Disable AI extraction of structured data
    #[arg(long)]
    pub no_ai: bool,

    /// Only exercise pagination: no descriptions, one job per page
    #[arg(long)]
    pub pagination_test: bool,

    /// Maximum number of jobs per search
    #[arg(long)]
    pub max_jobs: Option<usize>,

    /// Maximum number of pages per search
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Titles to search, in order of precedence: `--job`, `--jobs`, the
    /// (optionally filtered) default list, then the first default title.
    pub fn job_titles(&self) -> Vec<String> {
        if let Some(job) = &self.job {
            return vec![job.clone()];
        }
        if let Some(jobs) = &self.jobs
            && !jobs.is_empty()
        {
            return jobs.clone();
        }
        if self.use_default_jobs {
            let prefix = if self.junior_only {
                Some("junior")
            } else if self.graduate_only {
                Some("graduate")
            } else {
                None
            };
            return DEFAULT_JOB_TITLES
                .iter()
                .filter(|title| prefix.is_none_or(|p| title.starts_with(p)))
                .map(|title| (*title).to_string())
                .collect();
        }
        vec![DEFAULT_JOB_TITLES[0].to_string()]
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            days_posted: self.days.clone(),
            fetch_descriptions: !self.no_descriptions,
            use_structured_extraction: !self.no_ai,
            max_jobs: self.max_jobs,
            max_pages: self.max_pages,
            delay_between_pages: Duration::from_secs(self.delay_pages),
            delay_between_jobs: Duration::from_secs(self.delay_jobs),
            pagination_test: self.pagination_test,
        }
    }
}
