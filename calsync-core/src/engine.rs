//! Engine facade: shared context plus one provider per account kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::classify::ErrorClassifier;
use crate::clock::Clock;
use crate::connectivity::Connectivity;
use crate::error::SyncResult;
use crate::expansion::{ExpansionOutcome, RecurrenceExpander};
use crate::model::{
    Account, AccountInfo, Calendar, Capabilities, Event, MutationOutcome, RemoteCalendar,
};
use crate::mutations::EventMutations;
use crate::provider::{CaldavProvider, LocalProvider, Provider, SyncOutcome};
use crate::store::Store;
use crate::transport::Transport;

/// Collaborators every component is constructed with.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn Store>,
    pub transport: Arc<dyn Transport>,
    pub connectivity: Arc<dyn Connectivity>,
    pub clock: Arc<dyn Clock>,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn Store>,
        transport: Arc<dyn Transport>,
        connectivity: Arc<dyn Connectivity>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SyncContext {
            store,
            transport,
            connectivity,
            clock,
        }
    }

    pub fn classifier(&self) -> ErrorClassifier {
        ErrorClassifier::new(self.store.clone(), self.clock.clone())
    }

    pub fn mutations(&self) -> EventMutations {
        EventMutations::new(self.store.clone())
    }
}

pub struct SyncEngine {
    ctx: SyncContext,
    local: LocalProvider,
    caldav: CaldavProvider,
    expander: RecurrenceExpander,
}

impl SyncEngine {
    pub fn new(ctx: SyncContext) -> Self {
        SyncEngine {
            local: LocalProvider::new(ctx.mutations()),
            caldav: CaldavProvider::new(ctx.clone()),
            expander: RecurrenceExpander::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn provider_for(&self, account: &Account) -> &dyn Provider {
        if account.is_local() {
            &self.local
        } else {
            &self.caldav
        }
    }

    pub async fn get_account(&self, account: &Account) -> SyncResult<AccountInfo> {
        self.provider_for(account).get_account(account).await
    }

    pub async fn find_calendars(&self, account: &Account) -> SyncResult<BTreeMap<String, RemoteCalendar>> {
        self.provider_for(account).find_calendars(account).await
    }

    pub async fn sync_events(&self, account: &Account, calendar: &Calendar) -> SyncResult<SyncOutcome> {
        self.provider_for(account).sync_events(account, calendar).await
    }

    pub async fn ensure_recurrences_expanded(&self, max_date: DateTime<Utc>) -> SyncResult<ExpansionOutcome> {
        self.expander.ensure_recurrences_expanded(max_date).await
    }

    pub async fn create_event(&self, event: &Event) -> SyncResult<MutationOutcome> {
        let owners = self.ctx.store.owners_of_event(event).await?;
        self.provider_for(&owners.account)
            .create_event(&owners, event)
            .await
    }

    pub async fn update_event(&self, event: &Event) -> SyncResult<MutationOutcome> {
        let owners = self.ctx.store.owners_of_event(event).await?;
        self.provider_for(&owners.account)
            .update_event(&owners, event)
            .await
    }

    pub async fn delete_event(&self, event: &Event) -> SyncResult<()> {
        let owners = self.ctx.store.owners_of_event(event).await?;
        self.provider_for(&owners.account)
            .delete_event(&owners, event)
            .await
    }

    pub async fn calendar_capabilities(&self, calendar: &Calendar) -> SyncResult<Capabilities> {
        let owners = self.ctx.store.owners_of_calendar(&calendar.id).await?;
        Ok(self
            .provider_for(&owners.account)
            .calendar_capabilities(calendar))
    }

    /// Events have no ACLs of their own; this is the owning calendar's answer.
    pub async fn event_capabilities(&self, event: &Event) -> SyncResult<Capabilities> {
        let owners = self.ctx.store.owners_of_event(event).await?;
        Ok(self
            .provider_for(&owners.account)
            .calendar_capabilities(&owners.calendar))
    }
}
