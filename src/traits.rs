//! Traits and interfaces between the search loop and its I/O collaborators

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{CheckpointError, FetchError};
use crate::models::{JobRecord, SearchKey};

/// Site the search runs against.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Country code the origin was chosen for
    pub country: String,
    /// Origin every relative link is resolved against
    pub base_url: String,
    /// Search URL pattern with {base}, {query} and {location} placeholders
    pub search_url_pattern: String,
}

/// Known country origins; the first entry is the fallback.
pub const COUNTRY_ORIGINS: &[(&str, &str)] = &[
    ("uk", "https://uk.indeed.com"),
    ("us", "https://www.indeed.com"),
];

impl SiteConfig {
    /// Pick the origin for `country`, falling back to the UK site.
    pub fn for_country(country: &str) -> Self {
        let lookup = country.to_lowercase();
        let (code, base_url) = COUNTRY_ORIGINS
            .iter()
            .find(|(code, _)| *code == lookup)
            .copied()
            .unwrap_or_else(|| {
                warn!("Unknown country code '{}', falling back to uk", country);
                COUNTRY_ORIGINS[0]
            });

        Self::with_base_url(code, base_url)
    }

    pub fn with_base_url(country: &str, base_url: &str) -> Self {
        Self {
            country: country.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            search_url_pattern: "{base}/jobs?q={query}&l={location}".to_string(),
        }
    }

    /// Build the first results page URL for a search.
    ///
    /// # Arguments
    /// * `job_title` - Words of the job title, joined with `+`
    /// * `location` - Location, spaces replaced with `+`
    /// * `days_posted` - Optional "posted within N days" filter
    pub fn build_search_url(&self, job_title: &str, location: &str, days_posted: &str) -> String {
        let query = plus_joined(job_title);
        let location = plus_joined(location);

        let mut url = self
            .search_url_pattern
            .replace("{base}", &self.base_url)
            .replace("{query}", &query)
            .replace("{location}", &location);

        let days_posted = days_posted.trim();
        if !days_posted.is_empty() {
            url.push_str("&fromage=");
            url.push_str(&urlencoding::encode(days_posted));
        }
        url
    }
}

fn plus_joined(text: &str) -> String {
    text.split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

/// A successful gateway response.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    /// Raw page content (markup, or JSON when the service answered with extraction output)
    pub body: String,
    /// Structured extraction payload, when requested and present
    pub extracted: Option<Map<String, Value>>,
}

/// Rendering/proxy service the scraper fetches every page through.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    /// Fetch `url`, optionally asking the service for structured extraction.
    async fn fetch(&self, url: &str, extraction: bool) -> Result<FetchResponse, FetchError>;
}

/// Durable store for the accumulated records of one search.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Overwrite the checkpoint for `key` with the full record set.
    async fn persist(&self, records: &[JobRecord], key: &SearchKey) -> Result<(), CheckpointError>;
}
