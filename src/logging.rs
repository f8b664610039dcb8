//! Tracing setup and per-search log context

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{info_span, Dispatch, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::models::SearchKey;

/// `RUST_LOG` wins over `debug`.
fn filter(debug: bool) -> EnvFilter {
    let default = if debug { "job_finder=debug,info" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber.
pub fn init(debug: bool) {
    tracing_subscriber::fmt().with_env_filter(filter(debug)).init();
}

/// Span every event of one search is recorded under.
pub fn search_span(job_title: &str, location: &str) -> Span {
    info_span!("search", title = %job_title, location = %location)
}

/// Child span for one results page.
pub fn page_span(page: u32) -> Span {
    info_span!("page", number = page)
}

/// Directory holding one log file per title and location.
#[derive(Debug, Clone)]
pub struct SearchLogs {
    dir: PathBuf,
    debug: bool,
}

impl SearchLogs {
    pub fn new(dir: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            dir: dir.into(),
            debug,
        }
    }

    pub fn path(&self, key: &SearchKey) -> PathBuf {
        self.dir.join(key.log_file_name())
    }

    /// Subscriber for a single search: console output plus the search's own
    /// file, appended to without colours.
    pub fn dispatch(&self, key: &SearchKey) -> io::Result<Dispatch> {
        fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(key))?;

        let subscriber = tracing_subscriber::registry()
            .with(filter(self.debug))
            .with(fmt::layer())
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            );
        Ok(Dispatch::new(subscriber))
    }
}
