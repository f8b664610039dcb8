use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::gateway::DEFAULT_API_URL;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub data_dir: PathBuf,
    /// One log file per search lands here
    pub log_dir: PathBuf,
    /// Where raw pages are dumped for selector debugging, if anywhere
    pub debug_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            api_key: env::var("SCRAPINGBEE_API_KEY").context("SCRAPINGBEE_API_KEY must be set")?,
            api_url: env::var("SCRAPINGBEE_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            data_dir: env::var("JOB_FINDER_DATA_DIR")
                .map_or_else(|_| PathBuf::from("data"), PathBuf::from),
            log_dir: env::var("JOB_FINDER_LOG_DIR")
                .map_or_else(|_| PathBuf::from("logs"), PathBuf::from),
            debug_dir: env::var("JOB_FINDER_DEBUG_DIR").ok().map(PathBuf::from),
        })
    }
}
