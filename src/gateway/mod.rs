//! ScrapingBee rendering/proxy gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::error::FetchError;
use crate::traits::{FetchGateway, FetchResponse};

/// Header the service uses to return structured extraction output.
pub const EXTRACTION_HEADER: &str = "X-ScrapingBee-AI-Extraction";
/// Key whose presence marks a JSON body as extraction output.
pub const EXTRACTION_MARKER: &str = "job_title";

pub const DEFAULT_API_URL: &str = "https://app.scrapingbee.com/api/v1/";

/// Fields requested from structured extraction, with their descriptions.
pub const EXTRACTION_RULES: &[(&str, &str)] = &[
    ("job_title", "the job title"),
    ("company", "the company name"),
    ("location", "the job location"),
    ("salary", "the salary range if available"),
    (
        "required_skills",
        "list of required skills mentioned in the job description",
    ),
    ("experience_level", "years of experience required"),
    ("education", "education requirements"),
    (
        "job_summary",
        "summarize the job description in 2-3 sentences",
    ),
];

/// Rendering parameters sent with every request.
const RENDER_PARAMS: &[(&str, &str)] = &[
    ("render_js", "true"),
    ("premium_proxy", "true"),
    ("country_code", "gb"),
    ("stealth_proxy", "true"),
    ("wait", "5000"),
    ("block_resources", "false"),
    ("return_page_source", "true"),
];

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub api_url: String,
    pub api_key: String,
    pub timeout: Duration,
    /// Extra attempts after a timeout
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl GatewaySettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(90),
            max_retries: 1,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

pub struct ScrapingBeeGateway {
    client: Client,
    settings: GatewaySettings,
}

impl ScrapingBeeGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self { client, settings })
    }

    fn query(&self, url: &str, extraction: bool) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("api_key", self.settings.api_key.clone()),
            ("url", url.to_string()),
        ];
        query.extend(RENDER_PARAMS.iter().map(|(k, v)| (*k, (*v).to_string())));

        if extraction {
            info!("Using AI extraction for this request");
            query.push(("ai_extract_rules", extraction_rules_json()));
        }
        query
    }

    /// One round trip. The client timeout spans both the send and the body
    /// read, so either phase can time out.
    async fn round_trip(&self, url: &str, extraction: bool) -> Result<RawResponse, reqwest::Error> {
        let response = self
            .client
            .get(&self.settings.api_url)
            .query(&self.query(url, extraction))
            .send()
            .await?;

        let status = response.status();
        let header_payload = response
            .headers()
            .get(EXTRACTION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            header_payload,
            body,
        })
    }
}

struct RawResponse {
    status: StatusCode,
    header_payload: Option<String>,
    body: String,
}

#[async_trait]
impl FetchGateway for ScrapingBeeGateway {
    async fn fetch(&self, url: &str, extraction: bool) -> Result<FetchResponse, FetchError> {
        let mut attempt = 0;
        let raw = loop {
            attempt += 1;
            info!("Sending request to ScrapingBee for {}", url);

            match self.round_trip(url, extraction).await {
                Ok(raw) => break raw,
                Err(e) if e.is_timeout() && attempt <= self.settings.max_retries => {
                    warn!(
                        "Request timed out. Retrying ({}/{})...",
                        attempt, self.settings.max_retries
                    );
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
                Err(e) if e.is_timeout() => {
                    error!("Request timed out and max retries reached");
                    return Err(FetchError::Timeout { attempts: attempt });
                }
                Err(e) => return Err(FetchError::Transport(e)),
            }
        };

        if !raw.status.is_success() {
            error!("Error from ScrapingBee API: status {}", raw.status);
            return Err(FetchError::Status {
                status: raw.status.as_u16(),
                body: raw.body,
            });
        }
        info!("Successfully received response");

        let extracted = if extraction {
            side_payload(raw.header_payload.as_deref(), &raw.body)
        } else {
            None
        };

        Ok(FetchResponse {
            body: raw.body,
            extracted,
        })
    }
}

/// Extraction rules as the JSON object the service expects.
pub fn extraction_rules_json() -> String {
    let rules: Map<String, Value> = EXTRACTION_RULES
        .iter()
        .map(|(field, description)| ((*field).to_string(), Value::from(*description)))
        .collect();
    Value::Object(rules).to_string()
}

/// Find the structured extraction payload in the header or, failing that, the body.
pub fn side_payload(header: Option<&str>, body: &str) -> Option<Map<String, Value>> {
    if let Some(header) = header {
        match serde_json::from_str::<Value>(header) {
            Ok(Value::Object(map)) => {
                info!(
                    "Extracted AI data from headers: {:?}",
                    map.keys().collect::<Vec<_>>()
                );
                return Some(map);
            }
            _ => warn!("AI extraction header is not a JSON object"),
        }
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) if map.contains_key(EXTRACTION_MARKER) => {
            info!(
                "Extracted AI data from response body: {:?}",
                map.keys().collect::<Vec<_>>()
            );
            Some(map)
        }
        Ok(_) => {
            warn!("AI extraction was requested but no results were found in response");
            None
        }
        Err(_) => {
            warn!("AI extraction was requested but response is not JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_payload_takes_precedence() {
        let payload = side_payload(
            Some(r#"{"job_title":"From header"}"#),
            r#"{"job_title":"From body"}"#,
        )
        .unwrap();
        assert_eq!(payload["job_title"], "From header");
    }

    #[test]
    fn body_payload_needs_marker_key() {
        assert!(side_payload(None, r#"{"title":"x"}"#).is_none());
        assert!(side_payload(None, r#"{"job_title":"x","salary":"£1"}"#).is_some());
    }

    #[test]
    fn malformed_payloads_degrade_to_none() {
        assert!(side_payload(Some("not json"), "<html></html>").is_none());
        assert!(side_payload(None, "[1, 2]").is_none());
    }

    #[test]
    fn rules_cover_every_field() {
        let rules: Value = serde_json::from_str(&extraction_rules_json()).unwrap();
        assert_eq!(rules.as_object().unwrap().len(), EXTRACTION_RULES.len());
        assert_eq!(
            rules["job_summary"],
            "summarize the job description in 2-3 sentences"
        );
    }
}
