//! Webhook notification manager
//!
//! Posts one summary per batch of job results to a Slack-compatible incoming
//! webhook.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{Config, NotificationConfig, NotifyEvent};
use crate::managers::job_engine::JobResult;

const MAX_ERROR_CHARS: usize = 500;

/// Notification manager for sending webhook summaries
pub struct NotificationManager {
    webhook_url: String,
    notify_on: Vec<NotifyEvent>,
}

/// Slack incoming-webhook payload
#[derive(Debug, Serialize)]
struct SlackPayload {
    text: String,
}

impl NotificationManager {
    pub fn new(webhook_url: impl Into<String>, notify_on: Vec<NotifyEvent>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            notify_on,
        }
    }

    /// Build from config; `None` when no webhook is configured or the secret
    /// cannot be resolved
    pub fn from_config(config: &NotificationConfig) -> Option<Self> {
        let webhook = config.webhook.as_ref().filter(|w| !w.is_empty())?;
        match webhook.resolve() {
            Some(url) => Some(Self::new(url, config.notify_on.clone())),
            None => {
                warn!("Notification webhook configured but could not be resolved; notifications disabled");
                None
            }
        }
    }

    /// Check if notifications are enabled for an event type
    pub fn is_enabled(&self, event: NotifyEvent) -> bool {
        !self.webhook_url.is_empty() && self.notify_on.contains(&event)
    }

    /// Event describing a batch: any failed job makes it a failure
    pub fn batch_event(results: &[JobResult]) -> NotifyEvent {
        if results.iter().all(JobResult::success) {
            NotifyEvent::Success
        } else {
            NotifyEvent::Failure
        }
    }

    /// Send a summary of `results` if the batch's event is enabled
    pub fn notify_batch(&self, results: &[JobResult]) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }

        let event = Self::batch_event(results);
        if !self.is_enabled(event) {
            debug!("Notification type {:?} not enabled, skipping", event);
            return Ok(());
        }

        let payload = SlackPayload {
            text: build_summary(results),
        };
        self.send_webhook(&payload)?;

        info!("Sent {:?} notification for {} job(s)", event, results.len());
        Ok(())
    }

    fn send_webhook(&self, payload: &SlackPayload) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .context("Failed to send webhook")?;

        let status = response.status();
        if status.is_success() {
            debug!("Webhook sent successfully");
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            error!("Webhook failed with status {}: {}", status, body);
            anyhow::bail!("Webhook failed with status {}: {}", status, body)
        }
    }
}

/// Notify about a finished batch using the config's notification settings
///
/// Failures are logged and otherwise ignored.
pub fn notify_results(config: &Config, results: &[JobResult]) {
    if let Some(manager) = NotificationManager::from_config(&config.notifications) {
        if let Err(e) = manager.notify_batch(results) {
            warn!("Failed to send notification: {:#}", e);
        }
    }
}

/// Plain-text summary, one line per job followed by its errors
fn build_summary(results: &[JobResult]) -> String {
    let failed = results.iter().filter(|r| !r.success()).count();
    let mut lines = Vec::with_capacity(results.len() + 1);

    if failed == 0 {
        lines.push(format!(
            "\u{2705} core-backup: {} job(s) succeeded",
            results.len()
        ));
    } else {
        lines.push(format!(
            "\u{274C} core-backup: {} of {} job(s) failed",
            failed,
            results.len()
        ));
    }

    for result in results {
        lines.push(format!(
            "\u{2022} {}: {} ({})",
            result.job_name,
            result.status,
            format_duration(result.duration_secs())
        ));
        for err in &result.errors {
            lines.push(format!("    - {}", truncate(err, MAX_ERROR_CHARS)));
        }
    }

    lines.join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Format duration in human-readable form
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, secs)
        }
    } else {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}
