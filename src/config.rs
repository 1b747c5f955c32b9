use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use crate::event::HookEvent;

const DEFAULT_USER_AGENT: &str = concat!("download-notifier/", env!("CARGO_PKG_VERSION"));

/// Download notifier configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "download-notifier")]
#[command(version)]
#[command(about = "Post a webhook notification when a download task finishes")]
pub struct Config {
    /// Webhook endpoint receiving notifications
    #[arg(long, env = "NOTIFY_WEBHOOK_URL", default_value = "https://example.com/webhook")]
    pub webhook_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "NOTIFY_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Comma-separated events that trigger a notification
    #[arg(
        long,
        env = "NOTIFY_EVENTS",
        value_enum,
        value_delimiter = ',',
        default_value = "DOWNLOAD_DONE"
    )]
    pub events: Vec<HookEvent>,

    /// User-Agent header sent with notifications
    #[arg(long, env = "NOTIFY_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Forward the task document read from stdin in the notification
    #[arg(long, env = "NOTIFY_INCLUDE_TASK")]
    pub include_task: bool,

    /// How long to wait for task data on stdin, in milliseconds
    #[arg(long, env = "NOTIFY_STDIN_TIMEOUT_MS", default_value_t = 2000)]
    pub stdin_timeout_ms: u64,

    /// Append a JSONL record of each delivery attempt to this file
    #[arg(long, env = "NOTIFY_DELIVERY_LOG")]
    pub delivery_log: Option<String>,

    /// Send a simulated notification and fail unless the webhook answers 200
    #[arg(long)]
    pub test: bool,
}

impl Config {
    /// Load configuration from environment and CLI arguments
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors)
        let _ = dotenvy::dotenv();

        let config = Config::try_parse().context("Failed to parse configuration")?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("NOTIFY_TIMEOUT_SECS must be greater than zero");
        }
        if self.events.is_empty() {
            anyhow::bail!("NOTIFY_EVENTS must name at least one event");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stdin_timeout(&self) -> Duration {
        Duration::from_millis(self.stdin_timeout_ms)
    }

    pub fn accepts(&self, event: HookEvent) -> bool {
        self.events.contains(&event)
    }
}
