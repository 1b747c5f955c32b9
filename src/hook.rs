//! Hook flow run once per download event

use std::io::Read;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::event::{read_payload_from, HookEvent, TaskEnv};
use crate::notifier::{Delivery, Notification, Notifier, WebhookNotifier};
use crate::storage::{DeliveryRecord, JsonlWriter};

/// How a hook invocation ended; none of these are fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Event missing or not in the configured filter
    Skipped,
    /// The webhook answered, with any status
    Delivered(Delivery),
    /// The notifier could not be built or the request never got a response
    Failed,
}

/// Run the hook for one task event.
///
/// `stdin` is the stream the manager may pipe task data on.
pub async fn run<R>(config: &Config, env: &TaskEnv, stdin: Option<R>) -> HookOutcome
where
    R: Read + Send + 'static,
{
    let hook_event = match env.hook_event() {
        Some(event) if config.accepts(event) => event,
        _ => {
            info!(
                "Event is not {}, skipping",
                config
                    .events
                    .iter()
                    .map(|e| e.as_str())
                    .collect::<Vec<_>>()
                    .join(" or ")
            );
            return HookOutcome::Skipped;
        }
    };

    match hook_event {
        HookEvent::DownloadDone => {
            info!("Processing download completion for: {}", env.display_name())
        }
        HookEvent::DownloadError => {
            info!("Processing download failure for: {}", env.display_name())
        }
    }
    info!("Task path: {}", env.task_path.as_deref().unwrap_or("unknown"));

    let payload = match stdin {
        Some(reader) => read_payload_from(reader, config.stdin_timeout()).await,
        None => None,
    };
    if let Some(payload) = &payload {
        info!(
            "Full task data available: {}",
            payload.event.as_deref().unwrap_or("unknown")
        );
        debug!("Task data emitted at {:?}", payload.time);
    }

    let task = if config.include_task {
        payload.as_ref().and_then(|p| p.task().cloned())
    } else {
        None
    };
    let notification = Notification::new(hook_event, env).with_task(task);

    let notifier =
        match WebhookNotifier::new(&config.webhook_url, config.timeout(), &config.user_agent) {
            Ok(notifier) => notifier,
            Err(e) => {
                error!("Error sending notification: {}", e);
                record(config, &config.webhook_url, &notification, &Err(e));
                return HookOutcome::Failed;
            }
        };

    let result = notifier.notify(&notification).await;
    let outcome = match &result {
        Ok(delivery) if delivery.is_success() => {
            info!("Notification sent successfully");
            HookOutcome::Delivered(*delivery)
        }
        Ok(delivery) => {
            warn!("Webhook returned status {}", delivery.status);
            HookOutcome::Delivered(*delivery)
        }
        Err(e) => {
            error!("Error sending notification: {}", e);
            HookOutcome::Failed
        }
    };

    record(config, notifier.url(), &notification, &result);
    outcome
}

fn record(
    config: &Config,
    url: &str,
    notification: &Notification,
    result: &Result<Delivery, crate::notifier::NotifyError>,
) {
    let Some(path) = &config.delivery_log else {
        return;
    };

    let writer = JsonlWriter::new(path);
    let record = DeliveryRecord::new(url, notification, result);
    if let Err(e) = writer.write(&record) {
        warn!("Failed to record delivery in {}: {:#}", writer.file_path(), e);
    }
}
