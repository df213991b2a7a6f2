//! Change detection — diff fetched records against persisted state.

use chrono::{DateTime, Utc};
use tracing::info;

use outagewatch_common::{NotificationEvent, OutageRecord, StoredOutage, WatchState};

/// Diff `fetched` against `state`, in page order.
///
/// Emits one event per notifiable transition and updates stored display
/// fields in place. `notified_statuses` is never touched here — it is only
/// appended to after a confirmed delivery.
///
/// Outages present in `state` but absent from `fetched` stay untouched;
/// listing pages drop entries transiently and that must not lose history.
pub fn detect(
    fetched: &[OutageRecord],
    state: &mut WatchState,
    now: DateTime<Utc>,
) -> Vec<NotificationEvent> {
    let mut events = Vec::new();

    for record in fetched {
        match state.outages.get_mut(&record.id) {
            None => {
                info!(id = %record.id, title = %record.title, "New outage");
                events.push(NotificationEvent::NewOutage {
                    record: record.clone(),
                });
                state
                    .outages
                    .insert(record.id.clone(), StoredOutage::first_sighting(record, now));
            }
            Some(stored) => {
                // A transition counts once per (id, status); a status that
                // already notified stays silent even if it reappears after
                // oscillating through something else.
                if record.status != stored.status
                    && !stored.notified_statuses.contains(&record.status)
                {
                    info!(
                        id = %record.id,
                        old = %stored.status,
                        new = %record.status,
                        "Status change"
                    );
                    events.push(NotificationEvent::StatusChange {
                        record: record.clone(),
                        old_status: stored.status.clone(),
                        new_status: record.status.clone(),
                    });
                }
                stored.refresh_from(record, now);
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use outagewatch_common::OutageStatus;

    fn record(id: &str, status: OutageStatus) -> OutageRecord {
        OutageRecord {
            id: id.to_string(),
            date: "2025.12.09".to_string(),
            status,
            title: format!("障害{id}"),
            area: String::new(),
            url: format!("https://www.toshima.co.jp/trouble/detail/{id}/"),
        }
    }

    fn seeded(records: &[OutageRecord], now: DateTime<Utc>) -> WatchState {
        let mut state = WatchState::new(now);
        for r in records {
            state
                .outages
                .insert(r.id.clone(), StoredOutage::first_sighting(r, now));
        }
        state
    }

    #[test]
    fn unknown_id_yields_one_new_outage_event() {
        let now = Utc::now();
        let mut state = WatchState::new(now);
        let fetched = vec![record("91", OutageStatus::Ongoing)];

        let events = detect(&fetched, &mut state, now);

        assert_eq!(events.len(), 1);
        assert!(events[0].is_new_outage());
        let stored = &state.outages["91"];
        assert!(stored.notified_statuses.is_empty());
        assert_eq!(stored.status, OutageStatus::Ongoing);
    }

    #[test]
    fn unchanged_status_yields_no_event() {
        let now = Utc::now();
        let fetched = vec![record("91", OutageStatus::Ongoing)];
        let mut state = seeded(&fetched, now);

        let events = detect(&fetched, &mut state, now);
        assert!(events.is_empty());
    }

    #[test]
    fn changed_status_yields_one_status_change() {
        let now = Utc::now();
        let mut state = seeded(&[record("91", OutageStatus::Ongoing)], now);

        let events = detect(&[record("91", OutageStatus::Restored)], &mut state, now);

        assert_eq!(events.len(), 1);
        match &events[0] {
            NotificationEvent::StatusChange {
                old_status,
                new_status,
                ..
            } => {
                assert_eq!(*old_status, OutageStatus::Ongoing);
                assert_eq!(*new_status, OutageStatus::Restored);
            }
            other => panic!("expected StatusChange, got {other:?}"),
        }
        assert_eq!(state.outages["91"].status, OutageStatus::Restored);
    }

    #[test]
    fn already_notified_status_stays_silent() {
        let now = Utc::now();
        let mut state = seeded(&[record("91", OutageStatus::Ongoing)], now);
        state.mark_notified("91", &OutageStatus::Restored);

        // Status differs from the stored one but was already delivered.
        let events = detect(&[record("91", OutageStatus::Restored)], &mut state, now);
        assert!(events.is_empty());
        // Display fields still track the page.
        assert_eq!(state.outages["91"].status, OutageStatus::Restored);
    }

    #[test]
    fn oscillation_back_to_a_notified_status_stays_silent() {
        let now = Utc::now();
        // Ongoing was notified, then the outage moved to Investigating.
        let mut state = seeded(&[record("91", OutageStatus::Investigating)], now);
        state.mark_notified("91", &OutageStatus::Ongoing);

        let events = detect(&[record("91", OutageStatus::Ongoing)], &mut state, now);
        assert!(events.is_empty());
    }

    #[test]
    fn reopening_is_a_status_change_like_any_other() {
        let now = Utc::now();
        let mut state = seeded(&[record("91", OutageStatus::Closed)], now);

        let events = detect(&[record("91", OutageStatus::Ongoing)], &mut state, now);
        assert_eq!(events.len(), 1);
        assert_eq!(
            *events[0].notified_status(),
            OutageStatus::Ongoing
        );
    }

    #[test]
    fn events_follow_fetch_order() {
        let now = Utc::now();
        let mut state = seeded(&[record("90", OutageStatus::Ongoing)], now);

        let fetched = vec![
            record("91", OutageStatus::Ongoing),
            record("90", OutageStatus::Restored),
            record("92", OutageStatus::Ongoing),
        ];
        let events = detect(&fetched, &mut state, now);

        let ids: Vec<_> = events.iter().map(|e| e.outage_id().to_string()).collect();
        assert_eq!(ids, ["91", "90", "92"]);
    }

    #[test]
    fn absent_outages_are_left_untouched() {
        let now = Utc::now();
        let mut state = seeded(&[record("90", OutageStatus::Ongoing)], now);
        state.mark_notified("90", &OutageStatus::Ongoing);

        let events = detect(&[record("91", OutageStatus::Ongoing)], &mut state, now);

        assert_eq!(events.len(), 1);
        let untouched = &state.outages["90"];
        assert_eq!(untouched.status, OutageStatus::Ongoing);
        assert!(untouched.notified_statuses.contains(&OutageStatus::Ongoing));
    }

    #[test]
    fn display_fields_refresh_without_an_event() {
        let now = Utc::now();
        let mut state = seeded(&[record("91", OutageStatus::Ongoing)], now);

        let mut updated = record("91", OutageStatus::Ongoing);
        updated.title = "障害91（続報）".to_string();
        updated.area = "長崎4丁目".to_string();

        let events = detect(&[updated], &mut state, now);
        assert!(events.is_empty());
        assert_eq!(state.outages["91"].title, "障害91（続報）");
        assert_eq!(state.outages["91"].area, "長崎4丁目");
    }
}
