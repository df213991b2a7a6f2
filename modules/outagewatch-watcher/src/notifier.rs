//! Notification delivery — message composition and the send boundary.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use outagewatch_common::{NotificationEvent, OutageRecord, OutageStatus};
use x_client::XClient;

/// Messages are cut at this many characters before posting.
const MAX_POST_CHARS: usize = 280;

/// Delivery boundary. `Ok(())` means the notification is confirmed
/// delivered and the (id, status) pair may be marked as notified.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;
}

/// Posts to X.
pub struct XNotifier {
    client: XClient,
}

impl XNotifier {
    pub fn new(client: XClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for XNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let message = compose(event);
        let tweet = self.client.post_status(&message).await?;
        info!(tweet_id = %tweet.id, "Posted notification");
        Ok(())
    }
}

/// Logs the would-be message and reports success. No network, no quota.
pub struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        info!(message = %compose(event), "[dry run] Skipping post");
        Ok(())
    }
}

/// Shared-handle blanket — lets tests keep the notifier for assertions.
#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        (**self).notify(event).await
    }
}

/// Compose the user-visible message for an event, cut to the post limit.
pub fn compose(event: &NotificationEvent) -> String {
    let message = match event {
        NotificationEvent::NewOutage { record } => format_new_outage(record),
        NotificationEvent::StatusChange {
            record, new_status, ..
        } => format_status_change(record, new_status),
    };
    truncate_chars(message)
}

fn format_new_outage(record: &OutageRecord) -> String {
    let mut lines = vec![
        "【としまテレビ 障害情報】".to_string(),
        record.title.clone(),
    ];
    if !record.date.is_empty() {
        lines.push(format!("日時: {}", record.date));
    }
    if !record.area.is_empty() {
        lines.push(format!("地域: {}", record.area));
    }
    lines.push(format!("詳細: {}", record.url));
    lines.join("\n")
}

fn format_status_change(record: &OutageRecord, new_status: &OutageStatus) -> String {
    let mut lines = if new_status.is_terminal() {
        vec![
            format!("【としまテレビ {new_status}情報】"),
            format!("{} が{new_status}しました", record.title),
        ]
    } else {
        vec![
            "【としまテレビ 障害情報更新】".to_string(),
            format!("{}（{new_status}）", record.title),
        ]
    };
    if !record.area.is_empty() {
        lines.push(format!("地域: {}", record.area));
    }
    lines.push(format!("詳細: {}", record.url));
    lines.join("\n")
}

/// Character-count cut; the post limit counts characters, not bytes.
fn truncate_chars(message: String) -> String {
    let chars = message.chars().count();
    if chars <= MAX_POST_CHARS {
        return message;
    }
    let cut: String = message.chars().take(MAX_POST_CHARS - 3).collect();
    warn!(chars, "Message truncated to post limit");
    format!("{cut}...")
}
