//! Stream-to-store pipeline.
//!
//! Drains a remote entity stream into per-kind buffers while the stream
//! executes, then turns the buffers into a single transaction. Nothing is
//! staged when the stream fails, so a broken stream never commits anything.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::classify::ErrorClassifier;
use crate::error::{ErrorDetails, SyncResult};
use crate::model::{
    Account, Alarm, AlarmTrigger, Busytime, Calendar, Event, IcalComponent, RemoteOccurrence,
    SyncCache,
};
use crate::store::{Collection, Store, Transaction};
use crate::transport::stream::StreamedEvent;
use crate::transport::{RemoteStream, StreamEntity};

/// Context a stream is consumed in.
#[derive(Debug, Clone)]
pub struct StreamDetails {
    pub account: Account,
    pub calendar: Calendar,
    /// Known events keyed by URL; decides new vs. changed.
    pub cache: SyncCache,
    /// Collections this pass may write.
    pub stores: BTreeSet<Collection>,
}

impl StreamDetails {
    /// Event sync touches every collection.
    pub fn event_sync(account: Account, calendar: Calendar, cache: SyncCache) -> Self {
        StreamDetails {
            account,
            calendar,
            cache,
            stores: BTreeSet::from([
                Collection::Events,
                Collection::Busytimes,
                Collection::Alarms,
                Collection::IcalComponents,
            ]),
        }
    }

    /// Recurrence expansion never rewrites events themselves.
    pub fn expansion(account: Account, calendar: Calendar) -> Self {
        StreamDetails {
            account,
            calendar,
            cache: SyncCache::new(),
            stores: BTreeSet::from([
                Collection::Alarms,
                Collection::Busytimes,
                Collection::IcalComponents,
            ]),
        }
    }

    pub fn error_details(&self) -> ErrorDetails {
        ErrorDetails::new(self.account.id.as_deref(), Some(&self.calendar.id))
    }

    fn writes(&self, collection: Collection) -> bool {
        self.stores.contains(&collection)
    }
}

/// Counts of what a pull committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub components: usize,
    pub occurrences: usize,
}

impl PullSummary {
    pub fn has_changes(&self) -> bool {
        self.created > 0
            || self.updated > 0
            || self.removed > 0
            || self.components > 0
            || self.occurrences > 0
    }
}

/// Entities received so far in one pass. Later writes to the same id win.
#[derive(Debug, Default)]
pub struct PullBuffer {
    events: BTreeMap<String, Event>,
    changed: BTreeSet<String>,
    removed: BTreeSet<String>,
    components: BTreeMap<String, IcalComponent>,
    busytimes: BTreeMap<String, Busytime>,
    alarms: BTreeMap<String, Alarm>,
}

impl PullBuffer {
    pub fn push(&mut self, entity: StreamEntity, details: &StreamDetails) {
        match entity {
            StreamEntity::Event(streamed) => self.push_event(streamed, details),
            StreamEntity::Component(mut component) => {
                if self.removed.contains(&component.event_id) {
                    debug!(event = %component.event_id, "dropping component of removed event");
                    return;
                }
                component.calendar_id = details.calendar.id.clone();
                self.components
                    .insert(component.event_id.clone(), component);
            }
            StreamEntity::Occurrence(occurrence) => match occurrence.event_id.clone() {
                Some(event_id) if self.removed.contains(&event_id) => {
                    debug!(event = %event_id, "dropping occurrence of removed event");
                }
                Some(event_id) => {
                    let triggers = occurrence.alarms.clone();
                    self.push_occurrence(&event_id, occurrence, &triggers, details);
                }
                None => warn!(calendar = %details.calendar.id, "dropping occurrence without event id"),
            },
            StreamEntity::MissingEvents(ids) => {
                for id in ids {
                    self.remove(id);
                }
            }
        }
    }

    fn push_event(&mut self, streamed: StreamedEvent, details: &StreamDetails) {
        let StreamedEvent {
            record,
            occurrences,
        } = streamed;

        let cached = record
            .event
            .url
            .as_ref()
            .and_then(|url| details.cache.get(url));
        let id = match cached {
            Some(cached) => cached.id.clone(),
            None => Event::local_id(&details.calendar.id, &record.event.id),
        };
        if cached.is_some() {
            self.changed.insert(id.clone());
        }
        self.removed.remove(&id);
        // Occurrences of an earlier version of the same event are stale.
        self.drop_occurrences(&id);

        let (remote, component) = record.into_parts(&id, &details.calendar.id);
        let event = Event {
            id: id.clone(),
            calendar_id: details.calendar.id.clone(),
            remote,
        };

        if let Some(component) = component {
            self.components.insert(id.clone(), component);
        }

        if occurrences.is_empty() && !event.remote.is_recurring {
            let busytime = Busytime::primary(&event);
            self.push_busytime(busytime, &event.remote.alarms);
        }
        for occurrence in occurrences {
            let triggers = if occurrence.alarms.is_empty() {
                event.remote.alarms.clone()
            } else {
                occurrence.alarms.clone()
            };
            self.push_occurrence(&id, occurrence, &triggers, details);
        }

        self.events.insert(id, event);
    }

    fn push_occurrence(
        &mut self,
        event_id: &str,
        occurrence: RemoteOccurrence,
        triggers: &[AlarmTrigger],
        details: &StreamDetails,
    ) {
        let busytime = Busytime::new(
            event_id,
            &details.calendar.id,
            occurrence.start_date,
            occurrence.end_date,
        );
        self.push_busytime(busytime, triggers);
    }

    fn push_busytime(&mut self, busytime: Busytime, triggers: &[AlarmTrigger]) {
        for alarm in busytime.alarms(triggers) {
            self.alarms.insert(alarm.id.clone(), alarm);
        }
        self.busytimes.insert(busytime.id.clone(), busytime);
    }

    fn drop_occurrences(&mut self, event_id: &str) {
        self.busytimes.retain(|_, b| b.event_id != event_id);
        self.alarms.retain(|_, a| a.event_id != event_id);
    }

    fn remove(&mut self, event_id: String) {
        self.events.remove(&event_id);
        self.changed.remove(&event_id);
        self.components.remove(&event_id);
        self.drop_occurrences(&event_id);
        self.removed.insert(event_id);
    }

    /// Order matters: removals and occurrence clears go before the writes they precede.
    pub fn into_transaction(self, details: &StreamDetails) -> (Transaction, PullSummary) {
        let mut tx = Transaction::new();
        let mut summary = PullSummary::default();

        if details.writes(Collection::Events) {
            for id in &self.removed {
                tx.remove_event(id);
                summary.removed += 1;
            }
            for (id, event) in self.events {
                if self.changed.contains(&id) {
                    if details.writes(Collection::Busytimes) {
                        tx.clear_occurrences(&id);
                    }
                    summary.updated += 1;
                } else {
                    summary.created += 1;
                }
                tx.persist_event(event);
            }
        } else if !self.events.is_empty() || !self.removed.is_empty() {
            debug!(calendar = %details.calendar.id, "events out of scope for this pass");
        }

        if details.writes(Collection::IcalComponents) {
            summary.components = self.components.len();
            for component in self.components.into_values() {
                tx.persist_component(component);
            }
        }

        if details.writes(Collection::Busytimes) {
            summary.occurrences = self.busytimes.len();
            for busytime in self.busytimes.into_values() {
                tx.persist_busytime(busytime);
            }
        }

        if details.writes(Collection::Alarms) {
            for alarm in self.alarms.into_values() {
                tx.persist_alarm(alarm);
            }
        }

        (tx, summary)
    }
}

/// A drained stream ready to commit. The caller may add writes before committing.
#[derive(Debug)]
pub struct StagedPull {
    pub transaction: Transaction,
    pub summary: PullSummary,
}

#[derive(Clone)]
pub struct StreamPipeline {
    store: Arc<dyn Store>,
    classifier: ErrorClassifier,
}

impl StreamPipeline {
    pub fn new(store: Arc<dyn Store>, classifier: ErrorClassifier) -> Self {
        StreamPipeline { store, classifier }
    }

    /// Execute the stream and buffer its entities. Resolves once the stream
    /// has fully drained; a failed stream yields the classified error.
    pub async fn stage(&self, stream: RemoteStream, details: &StreamDetails) -> SyncResult<StagedPull> {
        let (execute, mut entities) = stream.into_parts();

        let consume = async {
            let mut buffer = PullBuffer::default();
            while let Some(entity) = entities.recv().await {
                buffer.push(entity, details);
            }
            buffer
        };

        let (outcome, buffer) = tokio::join!(execute, consume);
        if let Err(err) = outcome {
            return Err(self.classifier.classify(err, &details.error_details()).await);
        }

        let (transaction, summary) = buffer.into_transaction(details);
        Ok(StagedPull {
            transaction,
            summary,
        })
    }

    /// Stage and commit in one go.
    pub async fn consume(&self, stream: RemoteStream, details: &StreamDetails) -> SyncResult<PullSummary> {
        let StagedPull {
            transaction,
            summary,
        } = self.stage(stream, details).await?;

        self.store.commit(transaction).await?;
        info!(
            calendar = %details.calendar.id,
            created = summary.created,
            updated = summary.updated,
            removed = summary.removed,
            occurrences = summary.occurrences,
            "stream committed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CachedEvent, RemoteCalendar, RemoteEvent, RemoteEventRecord, TransportDate};

    fn details() -> StreamDetails {
        let calendar = Calendar::new(
            "acct1",
            RemoteCalendar {
                id: "home".into(),
                ..Default::default()
            },
        );
        let mut cache = SyncCache::new();
        cache.insert(
            "/home/known.ics".into(),
            CachedEvent {
                id: "acct1-home-known".into(),
                sync_token: Some("1".into()),
            },
        );
        StreamDetails::event_sync(
            Account::remote("acct1", "me", "https://dav.example.com"),
            calendar,
            cache,
        )
    }

    fn streamed(id: &str, title: &str) -> StreamEntity {
        StreamEntity::Event(StreamedEvent {
            record: RemoteEventRecord {
                event: RemoteEvent {
                    id: id.into(),
                    url: Some(format!("/home/{id}.ics")),
                    sync_token: Some("2".into()),
                    title: title.into(),
                    description: None,
                    location: None,
                    start_date: TransportDate { utc: 0, offset: 0, tzid: None },
                    end_date: TransportDate { utc: 1_800_000, offset: 0, tzid: None },
                    is_recurring: false,
                    alarms: vec![],
                },
                ical_component: Some(format!("SUMMARY:{title}")),
                last_recurrence_id: None,
            },
            occurrences: vec![],
        })
    }

    fn put_events(tx: &Transaction) -> Vec<&Event> {
        tx.ops()
            .iter()
            .filter_map(|op| match op {
                crate::store::WriteOp::PutEvent(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn classifies_new_and_changed_by_cache() {
        let details = details();
        let mut buffer = PullBuffer::default();
        buffer.push(streamed("known", "Known"), &details);
        buffer.push(streamed("fresh", "Fresh"), &details);

        let (tx, summary) = buffer.into_transaction(&details);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);

        let ids: Vec<_> = put_events(&tx).iter().map(|e| e.id.clone()).collect();
        assert!(ids.contains(&"acct1-home-known".to_string()));
        assert!(ids.contains(&"acct1-home-fresh".to_string()));
    }

    #[test]
    fn repeated_updates_keep_last() {
        let details = details();
        let mut buffer = PullBuffer::default();
        buffer.push(streamed("fresh", "First"), &details);
        buffer.push(streamed("fresh", "Second"), &details);

        let (tx, summary) = buffer.into_transaction(&details);
        let events = put_events(&tx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].remote.title, "Second");
        assert_eq!(summary.occurrences, 1);
    }

    #[test]
    fn missing_event_cancels_buffered_write() {
        let details = details();
        let mut buffer = PullBuffer::default();
        buffer.push(streamed("fresh", "Fresh"), &details);
        buffer.push(
            StreamEntity::MissingEvents(vec!["acct1-home-fresh".into()]),
            &details,
        );

        let (tx, summary) = buffer.into_transaction(&details);
        assert!(put_events(&tx).is_empty());
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.occurrences, 0);
    }

    #[test]
    fn removed_event_drops_later_occurrences_and_components() {
        let details = details();
        let mut buffer = PullBuffer::default();
        buffer.push(
            StreamEntity::MissingEvents(vec!["acct1-home-gone".into()]),
            &details,
        );
        buffer.push(
            StreamEntity::Occurrence(RemoteOccurrence {
                event_id: Some("acct1-home-gone".into()),
                start_date: TransportDate { utc: 86_400_000, offset: 0, tzid: None },
                end_date: TransportDate { utc: 90_000_000, offset: 0, tzid: None },
                alarms: vec![AlarmTrigger {
                    action: "DISPLAY".into(),
                    trigger: -600,
                }],
            }),
            &details,
        );
        buffer.push(
            StreamEntity::Component(IcalComponent {
                event_id: "acct1-home-gone".into(),
                calendar_id: "acct1-home".into(),
                ical: "BEGIN:VEVENT".into(),
                last_recurrence_id: None,
            }),
            &details,
        );

        let (tx, summary) = buffer.into_transaction(&details);
        assert_eq!(
            tx.ops(),
            &[crate::store::WriteOp::RemoveEvent("acct1-home-gone".into())]
        );
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.occurrences, 0);
        assert_eq!(summary.components, 0);
    }

    #[test]
    fn expansion_scope_skips_events() {
        let details = StreamDetails::expansion(details().account, details().calendar);
        let mut buffer = PullBuffer::default();
        buffer.push(streamed("fresh", "Fresh"), &details);
        buffer.push(
            StreamEntity::Occurrence(RemoteOccurrence {
                event_id: Some("acct1-home-rec".into()),
                start_date: TransportDate { utc: 86_400_000, offset: 0, tzid: None },
                end_date: TransportDate { utc: 90_000_000, offset: 0, tzid: None },
                alarms: vec![],
            }),
            &details,
        );

        let (tx, _) = buffer.into_transaction(&details);
        assert!(put_events(&tx).is_empty());
        assert!(tx.ops().iter().any(|op| matches!(
            op,
            crate::store::WriteOp::PutBusytime(b) if b.event_id == "acct1-home-rec"
        )));
    }

    #[test]
    fn changed_event_clears_old_occurrences_before_writes() {
        let details = details();
        let mut buffer = PullBuffer::default();
        buffer.push(streamed("known", "Known"), &details);

        let (tx, _) = buffer.into_transaction(&details);
        let clear = tx
            .ops()
            .iter()
            .position(|op| matches!(op, crate::store::WriteOp::ClearOccurrences(_)))
            .unwrap();
        let put = tx
            .ops()
            .iter()
            .position(|op| matches!(op, crate::store::WriteOp::PutBusytime(_)))
            .unwrap();
        assert!(clear < put);
    }
}
