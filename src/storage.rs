//! JSONL delivery log

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::trace;

use crate::notifier::{Delivery, Notification, NotifyError};

/// Result of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Sent,
    Rejected,
    Failed,
}

/// One line of the delivery log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// RFC3339 timestamp
    pub timestamp: String,
    pub url: String,
    pub event: String,
    pub task_id: Option<String>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryRecord {
    pub fn new(
        url: &str,
        notification: &Notification,
        result: &std::result::Result<Delivery, NotifyError>,
    ) -> Self {
        let (outcome, status, error) = match result {
            Ok(d) if d.is_success() => (Outcome::Sent, Some(d.status), None),
            Ok(d) => (Outcome::Rejected, Some(d.status), None),
            Err(e) => (Outcome::Failed, None, Some(e.to_string())),
        };

        Self {
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            url: url.to_string(),
            event: notification.event.as_str().to_string(),
            task_id: notification.task_id.clone(),
            outcome,
            status,
            error,
        }
    }
}

/// JSONL file writer for append-only records
pub struct JsonlWriter {
    file_path: String,
}

impl JsonlWriter {
    pub fn new(file_path: impl AsRef<str>) -> Self {
        Self {
            file_path: file_path.as_ref().to_string(),
        }
    }

    /// Append a record to the file, creating it if needed
    pub fn write<T: Serialize>(&self, record: &T) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize record to JSON")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .with_context(|| format!("Failed to open file for writing: {}", self.file_path))?;

        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write to file: {}", self.file_path))?;
        file.write_all(b"\n")?;
        file.flush()?;

        trace!("Wrote record to {}: {} bytes", self.file_path, json.len());

        Ok(())
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{HookEvent, TaskEnv};
    use std::fs;
    use std::io::{BufRead, BufReader};
    use tempfile::{tempdir, NamedTempFile};

    fn notification() -> Notification {
        let env = TaskEnv {
            task_id: Some("abc123".to_string()),
            task_name: Some("ubuntu.iso".to_string()),
            ..Default::default()
        };
        Notification::new(HookEvent::DownloadDone, &env)
    }

    #[test]
    fn test_record_outcomes() {
        let n = notification();
        let url = "https://example.com/webhook";

        let sent = DeliveryRecord::new(url, &n, &Ok(Delivery { status: 200 }));
        assert_eq!(sent.outcome, Outcome::Sent);
        assert_eq!(sent.status, Some(200));
        assert_eq!(sent.event, "DOWNLOAD_DONE");
        assert_eq!(sent.task_id.as_deref(), Some("abc123"));

        let rejected = DeliveryRecord::new(url, &n, &Ok(Delivery { status: 404 }));
        assert_eq!(rejected.outcome, Outcome::Rejected);
        assert_eq!(rejected.status, Some(404));

        let failed = DeliveryRecord::new(url, &n, &Err(NotifyError::EmptyUrl));
        assert_eq!(failed.outcome, Outcome::Failed);
        assert!(failed.status.is_none());
        assert_eq!(failed.error.as_deref(), Some("webhook URL is empty"));
    }

    #[test]
    fn test_write_appends_lines() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();
        let writer = JsonlWriter::new(path);
        let n = notification();

        writer
            .write(&DeliveryRecord::new("http://a", &n, &Ok(Delivery { status: 200 })))
            .unwrap();
        writer
            .write(&DeliveryRecord::new("http://a", &n, &Ok(Delivery { status: 500 })))
            .unwrap();

        let reader = BufReader::new(fs::File::open(path).unwrap());
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>().unwrap();
        assert_eq!(lines.len(), 2);

        let first: DeliveryRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.outcome, Outcome::Sent);
        assert!(lines[0].contains("\"outcome\":\"sent\""));
        assert!(!lines[0].contains("\"error\""));

        let second: DeliveryRecord = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second.outcome, Outcome::Rejected);
        assert_eq!(second.status, Some(500));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deliveries.jsonl");
        let writer = JsonlWriter::new(path.to_str().unwrap());

        writer
            .write(&DeliveryRecord::new("http://a", &notification(), &Err(NotifyError::EmptyUrl)))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let record: DeliveryRecord = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(record.outcome, Outcome::Failed);
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("deliveries.jsonl");
        let writer = JsonlWriter::new(path.to_str().unwrap());

        assert!(writer
            .write(&DeliveryRecord::new("http://a", &notification(), &Ok(Delivery { status: 200 })))
            .is_err());
    }
}
