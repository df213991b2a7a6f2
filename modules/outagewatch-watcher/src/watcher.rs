//! One reconciliation pass: fetch → diff → filter → notify → persist.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};

use crate::detector;
use crate::notifier::Notifier;
use crate::quota::QuotaPolicy;
use crate::scraper::OutageSource;
use crate::state::StateStore;

/// Counts from one pass. Observability only, not part of the contract.
#[derive(Debug, Default)]
pub struct WatchStats {
    pub records_fetched: u32,
    pub new_outages: u32,
    pub status_changes: u32,
    pub notified: u32,
    pub suppressed: u32,
    pub failed: u32,
}

impl std::fmt::Display for WatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Watch Pass Complete ===")?;
        writeln!(f, "Records fetched: {}", self.records_fetched)?;
        writeln!(f, "New outages:     {}", self.new_outages)?;
        writeln!(f, "Status changes:  {}", self.status_changes)?;
        writeln!(f, "Notified:        {}", self.notified)?;
        writeln!(f, "Suppressed:      {}", self.suppressed)?;
        write!(f, "Failed sends:    {}", self.failed)
    }
}

/// Runs the pass. Every collaborator is injected; the watcher holds no
/// state of its own between invocations.
pub struct Watcher {
    source: Box<dyn OutageSource>,
    store: Box<dyn StateStore>,
    notifier: Box<dyn Notifier>,
    quota: QuotaPolicy,
}

impl Watcher {
    pub fn new(
        source: Box<dyn OutageSource>,
        store: Box<dyn StateStore>,
        notifier: Box<dyn Notifier>,
        quota: QuotaPolicy,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
            quota,
        }
    }

    /// One complete pass.
    ///
    /// The only durable side effect is the single state write at the end.
    /// A structural failure (fetch exhausted, state unreadable) aborts
    /// before that write and leaves prior state untouched; a single
    /// delivery failure is absorbed and the pass continues.
    pub async fn run(&self) -> Result<WatchStats> {
        let now = Utc::now();
        let mut stats = WatchStats::default();

        let records = self
            .source
            .fetch_outages()
            .await
            .context("Outage fetch failed")?;
        if records.is_empty() {
            anyhow::bail!("Fetched zero outage records, refusing to diff against an empty listing");
        }
        stats.records_fetched = records.len() as u32;

        let mut state = self.store.load()?;

        let events = detector::detect(&records, &mut state, now);
        stats.new_outages = events.iter().filter(|e| e.is_new_outage()).count() as u32;
        stats.status_changes = events.len() as u32 - stats.new_outages;

        let eligible = self.quota.filter(events, &mut state.stats, now);
        stats.suppressed = stats.new_outages + stats.status_changes - eligible.len() as u32;

        for event in &eligible {
            match self.notifier.notify(event).await {
                Ok(()) => {
                    // Confirmed delivery — only now does this (id, status)
                    // pair stop being notifiable.
                    state.mark_notified(event.outage_id(), event.notified_status());
                    state.stats.increment(now);
                    stats.notified += 1;
                }
                Err(e) => {
                    error!(
                        id = event.outage_id(),
                        error = %e,
                        "Notification failed, event stays pending for a later pass"
                    );
                    stats.failed += 1;
                }
            }
        }

        state.last_check = now;
        self.store.save(&state)?;

        info!(
            notified = stats.notified,
            suppressed = stats.suppressed,
            failed = stats.failed,
            "Pass finished"
        );
        Ok(stats)
    }
}
