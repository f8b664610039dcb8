//! Resolves a job's full description from its detail page

use std::sync::Arc;

use scraper::Html;
use serde_json::Value;
use tracing::{info, warn};

use crate::extractor::{FieldRule, Probe};
use crate::models::DescriptionResult;
use crate::traits::FetchGateway;

/// Key of the pre-computed summary in a structured extraction body.
pub const SUMMARY_KEY: &str = "job_summary";

pub const DESCRIPTION: FieldRule = FieldRule {
    name: "description",
    probes: &[
        Probe::Css("div#jobDescriptionText"),
        Probe::Css("div.jobsearch-jobDescriptionText"),
        Probe::Css("div[data-testid='jobDescriptionText']"),
    ],
};

#[derive(Clone)]
pub struct DescriptionFetcher {
    gateway: Arc<dyn FetchGateway>,
}

impl DescriptionFetcher {
    pub fn new(gateway: Arc<dyn FetchGateway>) -> Self {
        Self { gateway }
    }

    /// Fetch one job page and reduce it to text and/or structured data.
    ///
    /// Transport failures are logged and yield an empty result; they never
    /// propagate, since one missing description must not stop a page.
    pub async fn fetch(&self, url: &str, structured: bool) -> DescriptionResult {
        info!("Attempting to fetch job description");

        let response = match self.gateway.fetch(url, structured).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to retrieve job page {}: {}", url, e);
                return DescriptionResult::default();
            }
        };

        let conventional = description_text(&response.body);
        match &conventional {
            Some(text) => info!("Extracted job description ({} chars)", text.len()),
            None => warn!("Returned page but no description was extracted"),
        }

        DescriptionResult {
            conventional,
            structured: response.extracted.filter(|_| structured),
        }
    }
}

/// Description text from a detail page body.
///
/// A JSON body carrying a summary is used as-is; anything else is parsed as
/// markup. Paragraphs are joined with newlines.
pub fn description_text(body: &str) -> Option<String> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body)
        && let Some(Value::String(summary)) = map.get(SUMMARY_KEY)
    {
        return Some(summary.clone());
    }

    let document = Html::parse_document(body);
    let root = document.root_element();
    let element = DESCRIPTION
        .probes
        .iter()
        .find_map(|probe| probe.locate(root))?;

    let text = element
        .text()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() { None } else { Some(text) }
}
