//! Provider for the device-only calendar. Never touches the network.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::model::{
    Account, AccountInfo, Calendar, Capabilities, Event, LOCAL_ACCOUNT_ID, MutationOutcome,
    Owners, RemoteCalendar,
};
use crate::mutations::{EventMutations, EventPayload};
use crate::provider::{Provider, SyncOutcome};

pub const LOCAL_CALENDAR_NAME: &str = "Offline calendar";
pub const LOCAL_CALENDAR_COLOR: &str = "#F97C17";

#[derive(Clone)]
pub struct LocalProvider {
    mutations: EventMutations,
}

impl LocalProvider {
    pub fn new(mutations: EventMutations) -> Self {
        LocalProvider { mutations }
    }

    pub fn local_calendar() -> RemoteCalendar {
        RemoteCalendar {
            id: LOCAL_ACCOUNT_ID.to_string(),
            name: LOCAL_CALENDAR_NAME.to_string(),
            color: Some(LOCAL_CALENDAR_COLOR.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn get_account(&self, _account: &Account) -> SyncResult<AccountInfo> {
        Ok(AccountInfo {
            account_id: Some(LOCAL_ACCOUNT_ID.to_string()),
            ..Default::default()
        })
    }

    async fn find_calendars(&self, _account: &Account) -> SyncResult<BTreeMap<String, RemoteCalendar>> {
        Ok(BTreeMap::from([(
            LOCAL_ACCOUNT_ID.to_string(),
            Self::local_calendar(),
        )]))
    }

    async fn sync_events(&self, _account: &Account, _calendar: &Calendar) -> SyncResult<SyncOutcome> {
        Ok(SyncOutcome::LocalCalendar)
    }

    async fn create_event(&self, owners: &Owners, event: &Event) -> SyncResult<MutationOutcome> {
        let mut remote = event.remote.clone();
        if remote.id.is_empty() {
            remote.id = uuid::Uuid::new_v4().to_string();
        }

        let payload = EventPayload {
            event: Event::new(&owners.calendar.id, remote),
            ical_component: None,
        };
        self.mutations.create(payload).commit().await
    }

    async fn update_event(&self, _owners: &Owners, event: &Event) -> SyncResult<MutationOutcome> {
        let payload = EventPayload {
            event: event.clone(),
            ical_component: None,
        };
        self.mutations.update(payload).commit().await
    }

    async fn delete_event(&self, _owners: &Owners, event: &Event) -> SyncResult<()> {
        self.mutations.remove(&event.id).await
    }

    fn calendar_capabilities(&self, _calendar: &Calendar) -> Capabilities {
        Capabilities::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RemoteEvent, TransportDate};
    use crate::store::{MemoryStore, Store};
    use std::sync::Arc;

    fn owners() -> Owners {
        Owners {
            account: Account::local("acct0"),
            calendar: Calendar::new("acct0", LocalProvider::local_calendar()),
        }
    }

    #[tokio::test]
    async fn finds_the_offline_calendar() {
        let provider = LocalProvider::new(EventMutations::new(Arc::new(MemoryStore::new())));
        let calendars = provider.find_calendars(&Account::local("acct0")).await.unwrap();

        let calendar = &calendars[LOCAL_ACCOUNT_ID];
        assert_eq!(calendar.name, "Offline calendar");
        assert_eq!(calendar.color.as_deref(), Some("#F97C17"));
    }

    #[tokio::test]
    async fn create_assigns_remote_id() {
        let store = Arc::new(MemoryStore::new());
        let provider = LocalProvider::new(EventMutations::new(store.clone()));
        let owners = owners();

        let draft = Event {
            id: String::new(),
            calendar_id: owners.calendar.id.clone(),
            remote: RemoteEvent {
                id: String::new(),
                url: None,
                sync_token: None,
                title: "Dentist".into(),
                description: None,
                location: None,
                start_date: TransportDate { utc: 0, offset: 0, tzid: None },
                end_date: TransportDate { utc: 3_600_000, offset: 0, tzid: None },
                is_recurring: false,
                alarms: vec![],
            },
        };

        let outcome = provider.create_event(&owners, &draft).await.unwrap();
        assert!(!outcome.event.remote.id.is_empty());
        assert_eq!(
            outcome.event.id,
            format!("{}-{}", owners.calendar.id, outcome.event.remote.id)
        );
        assert!(store.event(&outcome.event.id).await.unwrap().is_some());
    }
}
