//! JSON + CSV checkpoint files

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CheckpointError;
use crate::models::{JobRecord, SearchKey};
use crate::traits::CheckpointStore;

/// Writes the full record set of a search to `{data_dir}/{stem}.json` and `.csv`.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    data_dir: PathBuf,
}

/// Flat CSV row; structured data is embedded as a JSON string.
#[derive(Serialize)]
struct CsvRow<'a> {
    title: &'a str,
    company: &'a str,
    location: &'a str,
    date_posted: &'a str,
    url: &'a str,
    description: &'a str,
    structured_data: String,
}

impl<'a> From<&'a JobRecord> for CsvRow<'a> {
    fn from(job: &'a JobRecord) -> Self {
        let structured_data = if job.structured_data.is_empty() {
            String::new()
        } else {
            serde_json::Value::Object(job.structured_data.clone()).to_string()
        };

        Self {
            title: &job.title,
            company: &job.company,
            location: &job.location,
            date_posted: &job.date_posted,
            url: &job.url,
            description: &job.description,
            structured_data,
        }
    }
}

impl FileCheckpointStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn json_path(&self, key: &SearchKey) -> PathBuf {
        self.data_dir.join(key.file_name("json"))
    }

    pub fn csv_path(&self, key: &SearchKey) -> PathBuf {
        self.data_dir.join(key.file_name("csv"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn persist(&self, records: &[JobRecord], key: &SearchKey) -> Result<(), CheckpointError> {
        if records.is_empty() {
            warn!("No jobs to save");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.data_dir).await?;

        let json_path = self.json_path(key);
        write_file(&json_path, serde_json::to_vec_pretty(records)?).await?;
        info!("Saved {} jobs to {}", records.len(), json_path.display());

        let csv_path = self.csv_path(key);
        write_file(&csv_path, to_csv(records)?).await?;
        info!("Saved {} jobs to {}", records.len(), csv_path.display());

        Ok(())
    }
}

pub fn to_csv(records: &[JobRecord]) -> Result<Vec<u8>, CheckpointError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for job in records {
        writer.serialize(CsvRow::from(job))?;
    }
    writer
        .into_inner()
        .map_err(|e| CheckpointError::Io(e.into_error()))
}

async fn write_file(path: &Path, contents: Vec<u8>) -> Result<(), CheckpointError> {
    tokio::fs::write(path, contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    #[test]
    fn csv_has_header_and_json_column() {
        let mut structured = Map::new();
        structured.insert("salary".to_string(), Value::from("£50k"));
        let job = JobRecord {
            title: "Engineer, Data".to_string(),
            company: "Acme".to_string(),
            location: "London".to_string(),
            date_posted: "Today".to_string(),
            url: "https://uk.indeed.com/viewjob?jk=1".to_string(),
            description: "Line one\nLine two".to_string(),
            structured_data: structured,
        };

        let csv = String::from_utf8(to_csv(&[job]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("title,company,location,date_posted,url,description,structured_data")
        );
        assert!(csv.contains("\"Engineer, Data\""));
        assert!(csv.contains(r#""{""salary"":""£50k""}""#));
    }
}
