//! Job listing scraper: walks paginated search results through a rendering
//! proxy, extracts listings, optionally enriches them with their full
//! description, and checkpoints everything after each page.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod description;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod job_finder;
pub mod logging;
pub mod models;
pub mod traits;

pub use job_finder::{JobFinder, SearchOptions};
