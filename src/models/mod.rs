//! Data models for job listings and search state

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder for a listing field the page did not provide.
pub const NOT_SPECIFIED: &str = "Not specified";
/// Placeholder for a listing whose link could not be resolved.
pub const NOT_AVAILABLE: &str = "Not available";
/// Placeholder for a total-count estimate that was not found.
pub const UNKNOWN_COUNT: &str = "Unknown";

/// One job listing scraped from a results page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub date_posted: String,
    pub url: String,
    pub description: String,
    pub structured_data: Map<String, Value>,
}

impl JobRecord {
    /// Whether the listing carries a resolvable link to its detail page.
    pub fn has_url(&self) -> bool {
        self.url != NOT_AVAILABLE
    }

    /// Folds a fetched description into the record.
    ///
    /// Only the parts that were requested are written, and absent results
    /// leave the empty defaults in place.
    pub fn merge_description(
        &mut self,
        details: DescriptionResult,
        keep_text: bool,
        keep_structured: bool,
    ) {
        if keep_text {
            self.description = details.conventional.unwrap_or_default();
        }
        if keep_structured && let Some(structured) = details.structured {
            self.structured_data = structured;
        }
    }
}

/// Outcome of fetching one job's detail page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptionResult {
    pub conventional: Option<String>,
    pub structured: Option<Map<String, Value>>,
}

/// Everything parsed out of one results page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageExtractionResult {
    /// Records in document order
    pub records: Vec<JobRecord>,
    /// Number of listing cards found, including ones that failed extraction
    pub cards_found: usize,
    pub next_page_url: Option<String>,
    pub total_count: String,
}

impl PageExtractionResult {
    pub fn empty(total_count: String) -> Self {
        Self {
            records: Vec::new(),
            cards_found: 0,
            next_page_url: None,
            total_count,
        }
    }
}

/// Identifies one search and names its checkpoint files.
#[derive(Debug, Clone)]
pub struct SearchKey {
    pub job_title: String,
    pub location: String,
    pub started_at: DateTime<Local>,
}

impl SearchKey {
    pub fn new(job_title: &str, location: &str) -> Self {
        Self {
            job_title: job_title.to_string(),
            location: location.to_string(),
            started_at: Local::now(),
        }
    }

    /// `{title}_{location}_{timestamp}` with spaces as underscores, lowercased.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}",
            slug(&self.job_title),
            slug(&self.location),
            self.started_at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.file_stem())
    }

    /// Log file shared by every run of the same title and location.
    pub fn log_file_name(&self) -> String {
        format!("{}_{}.log", slug(&self.job_title), slug(&self.location))
    }
}

fn slug(text: &str) -> String {
    text.replace(' ', "_").to_lowercase()
}

/// Why a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    FetchFailure,
    NoCardsFound,
    PageLimit,
    JobLimit,
    PaginationComplete,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::FetchFailure => "fetch failure",
            Self::NoCardsFound => "no cards found",
            Self::PageLimit => "page limit",
            Self::JobLimit => "job limit",
            Self::PaginationComplete => "pagination complete",
        };
        f.write_str(text)
    }
}

/// State of one in-flight search.
#[derive(Debug)]
pub struct SearchState {
    pub page: u32,
    pub page_url: String,
    pub total_count: String,
    pub records: Vec<JobRecord>,
    pub termination: Option<TerminationReason>,
}

impl SearchState {
    pub fn new(first_page_url: String) -> Self {
        Self {
            page: 1,
            page_url: first_page_url,
            total_count: UNKNOWN_COUNT.to_string(),
            records: Vec::new(),
            termination: None,
        }
    }

    /// Records still allowed under `max_jobs`, or `None` when unlimited.
    pub fn remaining_budget(&self, max_jobs: Option<usize>) -> Option<usize> {
        max_jobs.map(|max| max.saturating_sub(self.records.len()))
    }
}

/// Final result of a search.
#[derive(Debug)]
pub struct SearchOutcome {
    pub records: Vec<JobRecord>,
    pub pages_visited: u32,
    pub total_count: String,
    pub termination: TerminationReason,
    pub key: SearchKey,
}
