//! Providers: one fixed method set, two implementations.
//!
//! The engine selects a provider once per account: `LocalProvider` for the
//! device-only sentinel account, `CaldavProvider` for everything else.

mod caldav;
mod local;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::model::{
    Account, AccountInfo, Calendar, Capabilities, Event, MutationOutcome, Owners, RemoteCalendar,
};
use crate::pipeline::PullSummary;

pub use caldav::{CaldavProvider, PREV_DAYS_TO_SYNC, sync_window_start};
pub use local::{LOCAL_CALENDAR_COLOR, LOCAL_CALENDAR_NAME, LocalProvider};

/// How a `sync_events` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local calendars never sync.
    LocalCalendar,
    /// The remote sync token matched; no request was made.
    UpToDate,
    Synced(PullSummary),
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn get_account(&self, account: &Account) -> SyncResult<AccountInfo>;

    async fn find_calendars(&self, account: &Account) -> SyncResult<BTreeMap<String, RemoteCalendar>>;

    async fn sync_events(&self, account: &Account, calendar: &Calendar) -> SyncResult<SyncOutcome>;

    async fn create_event(&self, owners: &Owners, event: &Event) -> SyncResult<MutationOutcome>;

    async fn update_event(&self, owners: &Owners, event: &Event) -> SyncResult<MutationOutcome>;

    async fn delete_event(&self, owners: &Owners, event: &Event) -> SyncResult<()>;

    fn calendar_capabilities(&self, calendar: &Calendar) -> Capabilities;
}
