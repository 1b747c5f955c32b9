//! Webhook notification delivery

use crate::event::{HookEvent, TaskEnv};
use reqwest::{header, Client, Url};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook URL is empty")]
    EmptyUrl,

    #[error("invalid webhook URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook test failed: {url} returned status {status}")]
    TestRejected { url: String, status: u16 },
}

/// JSON body posted to the webhook
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub event: HookEvent,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub task_path: Option<String>,
    pub status: Option<String>,
    pub status_label: &'static str,
    pub message: String,
    /// Unix timestamp in milliseconds
    pub time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(event: HookEvent, env: &TaskEnv) -> Self {
        let message = match event {
            HookEvent::DownloadDone => {
                format!("Download '{}' completed successfully", env.display_name())
            }
            HookEvent::DownloadError => format!("Download '{}' failed", env.display_name()),
        };

        Self {
            event,
            task_id: env.task_id.clone(),
            task_name: env.task_name.clone(),
            task_path: env.task_path.clone(),
            status: env.task_status.clone(),
            status_label: env.status().as_str(),
            message,
            time: now_millis(),
            task: None,
        }
    }

    /// Attach the full task document received on stdin
    pub fn with_task(mut self, task: Option<serde_json::Value>) -> Self {
        self.task = task;
        self
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Response status of a delivered notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub status: u16,
}

impl Delivery {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for delivering notifications
pub trait Notifier: Send + Sync {
    /// Send a notification and report the endpoint's response status
    async fn notify(&self, notification: &Notification) -> Result<Delivery, NotifyError>;
}

/// Posts notifications as JSON to a single webhook URL
pub struct WebhookNotifier {
    client: Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration, user_agent: &str) -> Result<Self, NotifyError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(NotifyError::EmptyUrl);
        }

        let url = Url::parse(url).map_err(|e| NotifyError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(NotifyError::Client)?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<Delivery, NotifyError> {
        debug!("Posting {} notification to {}", notification.event.as_str(), self.url);

        let response = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(notification)
            .send()
            .await?;

        Ok(Delivery {
            status: response.status().as_u16(),
        })
    }
}

/// Send a simulated completed-download notification and require HTTP 200
pub async fn send_test(notifier: &WebhookNotifier) -> Result<Delivery, NotifyError> {
    let env = TaskEnv {
        event: Some(HookEvent::DownloadDone.as_str().to_string()),
        task_id: Some("test-task".to_string()),
        task_name: Some("test-file.zip".to_string()),
        task_status: Some("5".to_string()),
        task_path: Some("/downloads/test-file.zip".to_string()),
    };
    let notification = Notification::new(HookEvent::DownloadDone, &env);

    let delivery = notifier.notify(&notification).await?;
    if delivery.status != 200 {
        return Err(NotifyError::TestRejected {
            url: notifier.url().to_string(),
            status: delivery.status,
        });
    }

    Ok(delivery)
}
