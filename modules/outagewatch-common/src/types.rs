use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Status ---

/// Status label the provider attaches to a listing entry.
///
/// The scraper maps raw page text into this enum at the boundary; nothing
/// downstream ever sees raw labels. Wire form (page and state file alike) is
/// the raw label string, with the empty string standing for an ongoing
/// outage that has no label yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutageStatus {
    /// No label on the page yet.
    Ongoing,
    Investigating,
    TemporarilyRestored,
    Restored,
    Completed,
    Closed,
    /// A label we have not seen before. Kept verbatim so persisted state
    /// round-trips and duplicate suppression still applies to it.
    Other(String),
}

impl OutageStatus {
    pub fn from_label(raw: &str) -> Self {
        match raw.trim() {
            "" => OutageStatus::Ongoing,
            "調査中" => OutageStatus::Investigating,
            "一時復旧" => OutageStatus::TemporarilyRestored,
            "復旧" => OutageStatus::Restored,
            "完了" => OutageStatus::Completed,
            "終了" => OutageStatus::Closed,
            other => OutageStatus::Other(other.to_string()),
        }
    }

    /// The wire label as it appears on the page and in the state file.
    pub fn as_label(&self) -> &str {
        match self {
            OutageStatus::Ongoing => "",
            OutageStatus::Investigating => "調査中",
            OutageStatus::TemporarilyRestored => "一時復旧",
            OutageStatus::Restored => "復旧",
            OutageStatus::Completed => "完了",
            OutageStatus::Closed => "終了",
            OutageStatus::Other(label) => label,
        }
    }

    /// Statuses that end the outage from the subscriber's point of view.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OutageStatus::TemporarilyRestored
                | OutageStatus::Restored
                | OutageStatus::Completed
                | OutageStatus::Closed
        )
    }
}

impl From<String> for OutageStatus {
    fn from(raw: String) -> Self {
        OutageStatus::from_label(&raw)
    }
}

impl From<OutageStatus> for String {
    fn from(status: OutageStatus) -> Self {
        status.as_label().to_string()
    }
}

impl std::fmt::Display for OutageStatus {
    /// Human-readable label; an ongoing outage renders as 進行中.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutageStatus::Ongoing => write!(f, "進行中"),
            other => write!(f, "{}", other.as_label()),
        }
    }
}

// --- Fetched records ---

/// One outage as currently published on the trouble-listing page.
/// Immutable per fetch; the id stays stable across the outage's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageRecord {
    /// Stable identifier extracted from the detail URL.
    pub id: String,
    /// Reported date in the page's YYYY.MM.DD form (may be empty).
    pub date: String,
    pub status: OutageStatus,
    pub title: String,
    /// Free-text affected area (may be empty).
    pub area: String,
    /// Detail page URL.
    pub url: String,
}

// --- Persisted state ---

/// Durable record of one outage plus its notification history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOutage {
    pub id: String,
    pub date: String,
    pub status: OutageStatus,
    pub title: String,
    pub area: String,
    pub url: String,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Statuses already delivered for this outage. Appended only after a
    /// confirmed successful delivery; never cleared while the id is kept.
    #[serde(default)]
    pub notified_statuses: BTreeSet<OutageStatus>,
}

impl StoredOutage {
    /// First sighting of a record. Nothing has been notified yet.
    pub fn first_sighting(record: &OutageRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id.clone(),
            date: record.date.clone(),
            status: record.status.clone(),
            title: record.title.clone(),
            area: record.area.clone(),
            url: record.url.clone(),
            first_seen: now,
            last_updated: now,
            notified_statuses: BTreeSet::new(),
        }
    }

    /// Track the page's current display fields. Notification history is
    /// deliberately left alone.
    pub fn refresh_from(&mut self, record: &OutageRecord, now: DateTime<Utc>) {
        self.date = record.date.clone();
        self.status = record.status.clone();
        self.title = record.title.clone();
        self.area = record.area.clone();
        self.url = record.url.clone();
        self.last_updated = now;
    }
}

/// UTC month key used by the notification counter.
pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Monthly notification counter. `count` is only meaningful for `month`, so
/// every read or increment goes through `resolve` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCounter {
    /// Calendar month key, "YYYY-MM" (UTC).
    pub month: String,
    #[serde(rename = "total_notifications_this_month")]
    pub count: u32,
}

impl NotificationCounter {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            month: month_key(now),
            count: 0,
        }
    }

    /// Month-rollover check. When the wall-clock month differs from the
    /// stored one, the count resets to 0 and the month advances.
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        let current = month_key(now);
        if self.month != current {
            tracing::info!(from = %self.month, to = %current, "Notification counter rolled over");
            self.month = current;
            self.count = 0;
        }
    }

    /// Record one confirmed delivery.
    pub fn increment(&mut self, now: DateTime<Utc>) {
        self.resolve(now);
        self.count += 1;
    }
}

pub const SCHEMA_VERSION: &str = "1.0";

/// Durable state: every outage ever seen plus the monthly counter.
///
/// Loaded once per pass, mutated in memory, written back atomically exactly
/// once at the end of the pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchState {
    pub schema_version: String,
    pub last_check: DateTime<Utc>,
    /// Keyed by outage id. Entries are never deleted; ids absent from a
    /// fetch are left untouched.
    pub outages: BTreeMap<String, StoredOutage>,
    pub stats: NotificationCounter,
}

impl WatchState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            last_check: now,
            outages: BTreeMap::new(),
            stats: NotificationCounter::new(now),
        }
    }

    /// Append a status to an outage's notified set. Call only after a
    /// confirmed successful delivery for that exact (id, status) pair.
    pub fn mark_notified(&mut self, id: &str, status: &OutageStatus) {
        if let Some(stored) = self.outages.get_mut(id) {
            stored.notified_statuses.insert(status.clone());
        }
    }
}

// --- Events ---

/// A single notifiable transition, in page order.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// An id we have never seen before.
    NewOutage { record: OutageRecord },
    /// A known outage moved to a status that has not been notified yet.
    StatusChange {
        record: OutageRecord,
        old_status: OutageStatus,
        new_status: OutageStatus,
    },
}

impl NotificationEvent {
    pub fn outage_id(&self) -> &str {
        match self {
            NotificationEvent::NewOutage { record } => &record.id,
            NotificationEvent::StatusChange { record, .. } => &record.id,
        }
    }

    /// The status that gets marked as notified if delivery succeeds.
    pub fn notified_status(&self) -> &OutageStatus {
        match self {
            NotificationEvent::NewOutage { record } => &record.status,
            NotificationEvent::StatusChange { new_status, .. } => new_status,
        }
    }

    pub fn is_new_outage(&self) -> bool {
        matches!(self, NotificationEvent::NewOutage { .. })
    }
}
