mod config;
mod event;
mod hook;
mod notifier;
mod storage;

use anyhow::{Context, Result};
use config::Config;
use event::{piped_stdin, TaskEnv};
use notifier::{send_test, WebhookNotifier};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber with environment filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    debug!("Configuration loaded: webhook={}", config.webhook_url);

    if config.test {
        let notifier =
            WebhookNotifier::new(&config.webhook_url, config.timeout(), &config.user_agent)
                .context("Failed to set up webhook notifier")?;
        let delivery = send_test(&notifier).await?;
        info!("Test notification accepted with status {}", delivery.status);
        return Ok(());
    }

    let env = TaskEnv::from_env();
    let outcome = hook::run(&config, &env, piped_stdin()).await;
    debug!("Hook finished: {:?}", outcome);

    Ok(())
}
