//! Local storage as seen by the engine.
//!
//! Reads go through the `Store` trait; every write is collected into a
//! `Transaction` and applied all-or-nothing by `Store::commit`.

mod memory;
mod transaction;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Account, Alarm, Busytime, Calendar, Event, IcalComponent, Owners};

pub use memory::MemoryStore;
pub use transaction::{Transaction, WriteOp};

/// Collections a pipeline may write to besides events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Events,
    Busytimes,
    Alarms,
    IcalComponents,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Summary of an applied transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub writes: usize,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn account(&self, id: &str) -> StoreResult<Option<Account>>;
    async fn accounts(&self) -> StoreResult<Vec<Account>>;
    async fn calendar(&self, id: &str) -> StoreResult<Option<Calendar>>;
    async fn calendars_for_account(&self, account_id: &str) -> StoreResult<Vec<Calendar>>;
    async fn event(&self, id: &str) -> StoreResult<Option<Event>>;
    async fn events_for_calendar(&self, calendar_id: &str) -> StoreResult<Vec<Event>>;
    async fn busytimes_for_event(&self, event_id: &str) -> StoreResult<Vec<Busytime>>;
    async fn alarms_for_event(&self, event_id: &str) -> StoreResult<Vec<Alarm>>;
    async fn ical_component(&self, event_id: &str) -> StoreResult<Option<IcalComponent>>;

    /// Recurring components whose expansion horizon lies strictly before `max_date`.
    async fn find_recurrences_before(&self, max_date: DateTime<Utc>) -> StoreResult<Vec<IcalComponent>>;

    /// Record a permanent error on an account.
    async fn mark_account_error(&self, account_id: &str, name: &str, at: DateTime<Utc>) -> StoreResult<()>;

    /// Apply every write of the transaction, or none of them.
    async fn commit(&self, transaction: Transaction) -> StoreResult<CommitReceipt>;

    async fn owners_of_calendar(&self, calendar_id: &str) -> StoreResult<Owners> {
        let calendar = self
            .calendar(calendar_id)
            .await?
            .ok_or_else(|| StoreError::not_found("calendar", calendar_id))?;
        let account = self
            .account(&calendar.account_id)
            .await?
            .ok_or_else(|| StoreError::not_found("account", &calendar.account_id))?;
        Ok(Owners { account, calendar })
    }

    async fn owners_of_event(&self, event: &Event) -> StoreResult<Owners> {
        self.owners_of_calendar(&event.calendar_id).await
    }
}
