//! Provider for CalDAV accounts: event sync orchestration and remote writes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use crate::classify::ErrorClassifier;
use crate::clock::start_of_day;
use crate::engine::SyncContext;
use crate::error::{ErrorDetails, SyncError, SyncResult};
use crate::model::{
    Account, AccountInfo, Calendar, Capabilities, Event, MutationOutcome, Owners, RemoteCalendar,
    SyncCache, sync_cache,
};
use crate::mutations::{EventMutations, EventPayload};
use crate::pipeline::{StagedPull, StreamDetails, StreamPipeline};
use crate::provider::{Provider, SyncOutcome};
use crate::transport::TransportRequest;
use crate::transport::protocol::{
    CreateEvent, DeleteEvent, FindCalendars, GetAccount, StreamEvents, StreamEventsOptions,
    SyncOptions, TransportCommand, UpdateEvent, UpdatePayload,
};

/// How far before the first-ever sync date event queries reach.
pub const PREV_DAYS_TO_SYNC: i64 = 31;

/// Start of the event query window. The first sync of a calendar pins
/// `first_event_sync_date` to the start of the current day.
pub fn sync_window_start(calendar: &mut Calendar, now: DateTime<Utc>) -> DateTime<Utc> {
    let first = *calendar
        .first_event_sync_date
        .get_or_insert_with(|| start_of_day(now));
    first - Duration::days(PREV_DAYS_TO_SYNC)
}

fn owner_details(owners: &Owners) -> ErrorDetails {
    ErrorDetails::new(owners.account.id.as_deref(), Some(&owners.calendar.id))
}

#[derive(Clone)]
pub struct CaldavProvider {
    ctx: SyncContext,
    classifier: ErrorClassifier,
    pipeline: StreamPipeline,
    mutations: EventMutations,
}

impl CaldavProvider {
    pub fn new(ctx: SyncContext) -> Self {
        let classifier = ctx.classifier();
        CaldavProvider {
            pipeline: StreamPipeline::new(ctx.store.clone(), classifier.clone()),
            mutations: EventMutations::new(ctx.store.clone()),
            classifier,
            ctx,
        }
    }

    fn ensure_online(&self) -> SyncResult<()> {
        if self.ctx.connectivity.is_online() {
            Ok(())
        } else {
            Err(SyncError::Offline)
        }
    }

    /// Send a request to the worker and decode its typed response.
    async fn send<C>(&self, command: &C, details: &ErrorDetails) -> SyncResult<C::Response>
    where
        C: TransportCommand + Sync,
    {
        let request = TransportRequest::new(command)?;
        match self.ctx.transport.request(request).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(err) => Err(self.classifier.classify(err, details).await),
        }
    }

    /// Locally known events of the calendar, keyed by URL, for the worker to diff against.
    async fn cached_events(&self, calendar: &Calendar) -> SyncResult<SyncCache> {
        let events = self.ctx.store.events_for_calendar(&calendar.id).await?;
        Ok(sync_cache(&events))
    }
}

#[async_trait]
impl Provider for CaldavProvider {
    async fn get_account(&self, account: &Account) -> SyncResult<AccountInfo> {
        self.ensure_online()?;
        let details = ErrorDetails::new(account.id.as_deref(), None);
        self.send(
            &GetAccount {
                account: account.clone(),
            },
            &details,
        )
        .await
    }

    async fn find_calendars(&self, account: &Account) -> SyncResult<BTreeMap<String, RemoteCalendar>> {
        self.ensure_online()?;
        let details = ErrorDetails::new(account.id.as_deref(), None);
        self.send(
            &FindCalendars {
                account: account.clone(),
            },
            &details,
        )
        .await
    }

    #[instrument(skip_all, fields(calendar = %calendar.id))]
    async fn sync_events(&self, account: &Account, calendar: &Calendar) -> SyncResult<SyncOutcome> {
        if account.is_local() {
            return Ok(SyncOutcome::LocalCalendar);
        }

        self.ensure_online()?;

        if calendar.is_current() {
            debug!("sync token unchanged, skipping");
            return Ok(SyncOutcome::UpToDate);
        }

        let sync_start = self.ctx.clock.now();
        let cache = self.cached_events(calendar).await?;

        // Bookkeeping goes on a copy that is only persisted with the commit.
        let mut calendar = calendar.clone();
        let start_date = sync_window_start(&mut calendar, sync_start);

        let command = StreamEvents {
            account: account.clone(),
            calendar: calendar.remote.clone(),
            options: StreamEventsOptions {
                start_date,
                cached: cache.clone(),
            },
        };
        let stream = self.ctx.transport.stream(TransportRequest::new(&command)?);

        let details = StreamDetails::event_sync(account.clone(), calendar.clone(), cache);
        let StagedPull {
            mut transaction,
            summary,
        } = self.pipeline.stage(stream, &details).await?;

        calendar.error = None;
        calendar.last_event_sync_token = calendar.remote.sync_token.clone();
        calendar.last_event_sync_date = Some(sync_start);
        transaction.persist_calendar(calendar);

        self.ctx.store.commit(transaction).await?;
        info!(
            created = summary.created,
            updated = summary.updated,
            removed = summary.removed,
            "calendar synced"
        );

        Ok(SyncOutcome::Synced(summary))
    }

    async fn create_event(&self, owners: &Owners, event: &Event) -> SyncResult<MutationOutcome> {
        self.ensure_online()?;

        let command = CreateEvent {
            account: owners.account.clone(),
            calendar: owners.calendar.remote.clone(),
            event: event.remote.clone(),
            options: SyncOptions { sync: true },
        };
        let record = self.send(&command, &owner_details(owners)).await?;

        let created = Event::new(&owners.calendar.id, record.event.clone());
        self.mutations
            .create(EventPayload::from_remote(created, record))
            .commit()
            .await
    }

    async fn update_event(&self, owners: &Owners, event: &Event) -> SyncResult<MutationOutcome> {
        self.ensure_online()?;

        let component = self.ctx.store.ical_component(&event.id).await?;
        let command = UpdateEvent {
            account: owners.account.clone(),
            calendar: owners.calendar.remote.clone(),
            event: UpdatePayload {
                event: event.remote.clone(),
                ical_component: component.map(|c| c.ical),
            },
            options: SyncOptions { sync: true },
        };
        let record = self.send(&command, &owner_details(owners)).await?;

        self.mutations
            .update(EventPayload::from_remote(event.clone(), record))
            .commit()
            .await
    }

    async fn delete_event(&self, owners: &Owners, event: &Event) -> SyncResult<()> {
        self.ensure_online()?;

        let command = DeleteEvent {
            account: owners.account.clone(),
            calendar: owners.calendar.remote.clone(),
            event: event.remote.clone(),
            options: SyncOptions { sync: true },
        };
        self.send(&command, &owner_details(owners)).await?;

        self.mutations.remove(&event.id).await
    }

    /// See RFC 3744. Servers without ACL discovery allow everything.
    fn calendar_capabilities(&self, calendar: &Calendar) -> Capabilities {
        match &calendar.remote.privilege_set {
            Some(privileges) => Capabilities::from_privileges(privileges),
            None => Capabilities::all(),
        }
    }
}
