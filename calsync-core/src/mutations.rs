//! All-or-nothing event writes spanning events, busytimes, alarms and ical components.

use std::sync::Arc;

use crate::error::SyncResult;
use crate::model::{Busytime, Event, IcalComponent, MutationOutcome, RemoteEventRecord};
use crate::store::{Store, Transaction};

/// An event together with its raw component, as written by a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub event: Event,
    pub ical_component: Option<IcalComponent>,
}

impl EventPayload {
    /// Apply a worker-returned record to an event: the descriptor replaces
    /// `event.remote` and the raw ical is split out into its own component.
    pub fn from_remote(mut event: Event, record: RemoteEventRecord) -> Self {
        let (remote, ical_component) = record.into_parts(&event.id, &event.calendar_id);
        event.remote = remote;
        EventPayload {
            event,
            ical_component,
        }
    }
}

#[derive(Clone)]
pub struct EventMutations {
    store: Arc<dyn Store>,
}

impl EventMutations {
    pub fn new(store: Arc<dyn Store>) -> Self {
        EventMutations { store }
    }

    pub fn create(&self, payload: EventPayload) -> Mutation {
        Mutation::build(self.store.clone(), payload, false)
    }

    /// Like `create`, but previous occurrences of the event are dropped first.
    pub fn update(&self, payload: EventPayload) -> Mutation {
        Mutation::build(self.store.clone(), payload, true)
    }

    pub async fn remove(&self, event_id: &str) -> SyncResult<()> {
        let mut tx = Transaction::new();
        tx.remove_event(event_id);
        self.store.commit(tx).await?;
        Ok(())
    }
}

/// A staged mutation. Nothing is written until `commit`.
pub struct Mutation {
    store: Arc<dyn Store>,
    transaction: Transaction,
    event: Event,
    busytime: Busytime,
}

impl Mutation {
    fn build(store: Arc<dyn Store>, payload: EventPayload, replace: bool) -> Self {
        let EventPayload {
            event,
            ical_component,
        } = payload;
        let busytime = Busytime::primary(&event);

        let mut transaction = Transaction::new();
        if replace {
            transaction.clear_occurrences(&event.id);
        }
        transaction.persist_event(event.clone());
        if let Some(component) = ical_component {
            transaction.persist_component(component);
        }
        for alarm in busytime.alarms(&event.remote.alarms) {
            transaction.persist_alarm(alarm);
        }
        transaction.persist_busytime(busytime.clone());

        Mutation {
            store,
            transaction,
            event,
            busytime,
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub async fn commit(self) -> SyncResult<MutationOutcome> {
        self.store.commit(self.transaction).await?;
        Ok(MutationOutcome {
            event: self.event,
            busytime: self.busytime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlarmTrigger, RemoteEvent, TransportDate};
    use crate::store::{MemoryStore, WriteOp};

    fn record(id: &str) -> RemoteEventRecord {
        RemoteEventRecord {
            event: RemoteEvent {
                id: id.into(),
                url: Some(format!("/home/{id}.ics")),
                sync_token: Some("1".into()),
                title: "Lunch".into(),
                description: None,
                location: None,
                start_date: TransportDate { utc: 7_200_000, offset: 0, tzid: None },
                end_date: TransportDate { utc: 10_800_000, offset: 0, tzid: None },
                is_recurring: false,
                alarms: vec![AlarmTrigger {
                    action: "DISPLAY".into(),
                    trigger: -600,
                }],
            },
            ical_component: Some("BEGIN:VCALENDAR\nEND:VCALENDAR".into()),
            last_recurrence_id: None,
        }
    }

    #[tokio::test]
    async fn create_writes_event_component_busytime_and_alarm() {
        let store = Arc::new(MemoryStore::new());
        let mutations = EventMutations::new(store.clone());

        let event = Event::new("cal1", record("abc").event);
        let outcome = mutations
            .create(EventPayload::from_remote(event, record("abc")))
            .commit()
            .await
            .unwrap();

        assert_eq!(outcome.event.id, "cal1-abc");
        assert_eq!(outcome.busytime.event_id, "cal1-abc");
        assert_eq!(store.writes(), 1);
        assert!(store.ical_component("cal1-abc").await.unwrap().is_some());
        assert_eq!(store.alarms_for_event("cal1-abc").await.unwrap().len(), 1);
    }

    #[test]
    fn update_clears_old_occurrences_first() {
        let store = Arc::new(MemoryStore::new());
        let mutations = EventMutations::new(store);

        let event = Event::new("cal1", record("abc").event);
        let mutation = mutations.update(EventPayload::from_remote(event, record("abc")));

        assert_eq!(
            mutation.transaction().ops().first(),
            Some(&WriteOp::ClearOccurrences("cal1-abc".into()))
        );
    }
}
