//! Monthly quota policy — degrade before the cap, never exceed it.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use outagewatch_common::{NotificationCounter, NotificationEvent};

/// Usage ratio at which status-change notifications stop.
const DEGRADED_RATIO: f64 = 0.90;
/// Usage ratio logged as critical. Behavior matches the degraded tier; the
/// second threshold exists for operator alerting.
const CRITICAL_RATIO: f64 = 0.96;

/// Decides which detected events may be sent this pass.
pub struct QuotaPolicy {
    limit: u32,
}

impl QuotaPolicy {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    /// Filter `events` down to the ones eligible under the monthly cap.
    ///
    /// Order is preserved. Dropped events are not queued anywhere: they were
    /// never marked notified, so they stay detectable on later passes as
    /// long as the status still differs from the last notified one.
    pub fn filter(
        &self,
        events: Vec<NotificationEvent>,
        counter: &mut NotificationCounter,
        now: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        counter.resolve(now);

        if self.limit == 0 {
            warn!("Monthly post limit is 0, suppressing all notifications");
            return Vec::new();
        }

        let ratio = counter.count as f64 / self.limit as f64;
        let degraded = ratio >= DEGRADED_RATIO;
        if ratio >= CRITICAL_RATIO {
            warn!(
                count = counter.count,
                limit = self.limit,
                "Quota critical, only new outages will be notified"
            );
        } else if degraded {
            warn!(
                count = counter.count,
                limit = self.limit,
                "Quota degraded, only new outages will be notified"
            );
        }

        let mut eligible: Vec<NotificationEvent> = events
            .into_iter()
            .filter(|event| !degraded || event.is_new_outage())
            .collect();

        // Never plan past the cap; whatever is cut stays detectable later.
        let remaining = self.limit.saturating_sub(counter.count) as usize;
        if eligible.len() > remaining {
            info!(
                cut = eligible.len() - remaining,
                "Truncating eligible events at the monthly cap"
            );
            eligible.truncate(remaining);
        }

        eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use outagewatch_common::{OutageRecord, OutageStatus};

    fn at(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap()
    }

    fn counter_with(count: u32, now: DateTime<Utc>) -> NotificationCounter {
        let mut counter = NotificationCounter::new(now);
        counter.count = count;
        counter
    }

    fn new_outage(id: &str) -> NotificationEvent {
        NotificationEvent::NewOutage {
            record: record(id),
        }
    }

    fn status_change(id: &str) -> NotificationEvent {
        NotificationEvent::StatusChange {
            record: record(id),
            old_status: OutageStatus::Ongoing,
            new_status: OutageStatus::Restored,
        }
    }

    fn record(id: &str) -> OutageRecord {
        OutageRecord {
            id: id.to_string(),
            date: String::new(),
            status: OutageStatus::Ongoing,
            title: format!("障害{id}"),
            area: String::new(),
            url: String::new(),
        }
    }

    #[test]
    fn below_the_degraded_tier_everything_is_eligible() {
        let now = at(2026, 3);
        let mut counter = counter_with(50, now);
        let events = vec![new_outage("1"), status_change("2"), new_outage("3")];

        let eligible = QuotaPolicy::new(100).filter(events.clone(), &mut counter, now);
        assert_eq!(eligible, events);
    }

    #[test]
    fn degraded_tier_keeps_only_new_outages_in_order() {
        let now = at(2026, 3);
        // 91 / 100 = 0.91 — inside the degraded band.
        let mut counter = counter_with(91, now);
        let events = vec![
            status_change("1"),
            new_outage("2"),
            status_change("3"),
            new_outage("4"),
        ];

        let eligible = QuotaPolicy::new(100).filter(events, &mut counter, now);
        let ids: Vec<_> = eligible.iter().map(|e| e.outage_id().to_string()).collect();
        assert_eq!(ids, ["2", "4"]);
        assert!(eligible.iter().all(NotificationEvent::is_new_outage));
    }

    #[test]
    fn critical_tier_behaves_like_the_degraded_tier() {
        let now = at(2026, 3);
        let mut counter = counter_with(97, now);
        let events = vec![status_change("1"), new_outage("2")];

        let eligible = QuotaPolicy::new(100).filter(events, &mut counter, now);
        assert_eq!(eligible.len(), 1);
        assert!(eligible[0].is_new_outage());
    }

    #[test]
    fn eligible_events_are_truncated_at_the_cap() {
        let now = at(2026, 3);
        let mut counter = counter_with(5, now);
        let events: Vec<_> = (1..=8).map(|i| new_outage(&i.to_string())).collect();

        // Only 5 sends remain before the cap of 10.
        let eligible = QuotaPolicy::new(10).filter(events, &mut counter, now);
        let ids: Vec<_> = eligible.iter().map(|e| e.outage_id().to_string()).collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn at_the_cap_nothing_is_eligible() {
        let now = at(2026, 3);
        let mut counter = counter_with(100, now);
        let eligible =
            QuotaPolicy::new(100).filter(vec![new_outage("1")], &mut counter, now);
        assert!(eligible.is_empty());
    }

    #[test]
    fn zero_limit_suppresses_everything() {
        let now = at(2026, 3);
        let mut counter = counter_with(0, now);
        let eligible = QuotaPolicy::new(0).filter(vec![new_outage("1")], &mut counter, now);
        assert!(eligible.is_empty());
    }

    #[test]
    fn month_rollover_restores_full_eligibility() {
        let now = at(2026, 3);
        let mut counter = counter_with(99, now);

        let next_month = at(2026, 4);
        let events = vec![status_change("1"), new_outage("2")];
        let eligible = QuotaPolicy::new(100).filter(events.clone(), &mut counter, next_month);

        assert_eq!(eligible, events);
        assert_eq!(counter.month, "2026-04");
        assert_eq!(counter.count, 0);
    }
}
