//! In-process store with atomic commits and JSON snapshots.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{Account, Alarm, Busytime, Calendar, ErrorMark, Event, IcalComponent};
use crate::store::{CommitReceipt, Store, StoreError, StoreResult, Transaction, WriteOp};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Collections {
    #[serde(default)]
    accounts: BTreeMap<String, Account>,
    #[serde(default)]
    calendars: BTreeMap<String, Calendar>,
    #[serde(default)]
    events: BTreeMap<String, Event>,
    #[serde(default)]
    busytimes: BTreeMap<String, Busytime>,
    #[serde(default)]
    alarms: BTreeMap<String, Alarm>,
    #[serde(default)]
    ical_components: BTreeMap<String, IcalComponent>,
}

impl Collections {
    fn clear_occurrences(&mut self, event_id: &str) {
        self.busytimes.retain(|_, b| b.event_id != event_id);
        self.alarms.retain(|_, a| a.event_id != event_id);
    }

    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::PutEvent(event) => {
                self.events.insert(event.id.clone(), event);
            }
            WriteOp::RemoveEvent(event_id) => {
                self.events.remove(&event_id);
                self.ical_components.remove(&event_id);
                self.clear_occurrences(&event_id);
            }
            WriteOp::ClearOccurrences(event_id) => self.clear_occurrences(&event_id),
            WriteOp::PutBusytime(busytime) => {
                self.busytimes.insert(busytime.id.clone(), busytime);
            }
            WriteOp::PutAlarm(alarm) => {
                self.alarms.insert(alarm.id.clone(), alarm);
            }
            WriteOp::PutComponent(component) => {
                self.ical_components
                    .insert(component.event_id.clone(), component);
            }
            WriteOp::PutCalendar(calendar) => {
                self.calendars.insert(calendar.id.clone(), calendar);
            }
        }
    }
}

/// Store keeping every collection behind one lock, so a commit is both
/// atomic and serialized with every other commit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Load a snapshot written by `save`. A missing file gives an empty store.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(MemoryStore::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let data: Collections = serde_json::from_str(&contents).map_err(|e| {
            StoreError::Snapshot(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(MemoryStore {
            data: RwLock::new(data),
            writes: AtomicUsize::new(0),
        })
    }

    /// Write a snapshot (temp file + rename, so readers never see a partial file).
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let contents = serde_json::to_string_pretty(&*self.data.read())
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, contents)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Seed an account. Accounts without an id get one.
    pub fn insert_account(&self, mut account: Account) -> Account {
        let id = account
            .id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        self.data.write().accounts.insert(id, account.clone());
        account
    }

    pub fn insert_calendar(&self, calendar: Calendar) {
        self.data
            .write()
            .calendars
            .insert(calendar.id.clone(), calendar);
    }

    pub fn insert_event(&self, event: Event) {
        self.data.write().events.insert(event.id.clone(), event);
    }

    pub fn insert_component(&self, component: IcalComponent) {
        self.data
            .write()
            .ical_components
            .insert(component.event_id.clone(), component);
    }

    /// Number of writes made through the `Store` trait (commits and error marks).
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn event_count(&self) -> usize {
        self.data.read().events.len()
    }

    pub fn busytime_count(&self) -> usize {
        self.data.read().busytimes.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn account(&self, id: &str) -> StoreResult<Option<Account>> {
        Ok(self.data.read().accounts.get(id).cloned())
    }

    async fn accounts(&self) -> StoreResult<Vec<Account>> {
        Ok(self.data.read().accounts.values().cloned().collect())
    }

    async fn calendar(&self, id: &str) -> StoreResult<Option<Calendar>> {
        Ok(self.data.read().calendars.get(id).cloned())
    }

    async fn calendars_for_account(&self, account_id: &str) -> StoreResult<Vec<Calendar>> {
        Ok(self
            .data
            .read()
            .calendars
            .values()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn event(&self, id: &str) -> StoreResult<Option<Event>> {
        Ok(self.data.read().events.get(id).cloned())
    }

    async fn events_for_calendar(&self, calendar_id: &str) -> StoreResult<Vec<Event>> {
        Ok(self
            .data
            .read()
            .events
            .values()
            .filter(|e| e.calendar_id == calendar_id)
            .cloned()
            .collect())
    }

    async fn busytimes_for_event(&self, event_id: &str) -> StoreResult<Vec<Busytime>> {
        Ok(self
            .data
            .read()
            .busytimes
            .values()
            .filter(|b| b.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn alarms_for_event(&self, event_id: &str) -> StoreResult<Vec<Alarm>> {
        Ok(self
            .data
            .read()
            .alarms
            .values()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn ical_component(&self, event_id: &str) -> StoreResult<Option<IcalComponent>> {
        Ok(self.data.read().ical_components.get(event_id).cloned())
    }

    async fn find_recurrences_before(&self, max_date: DateTime<Utc>) -> StoreResult<Vec<IcalComponent>> {
        Ok(self
            .data
            .read()
            .ical_components
            .values()
            .filter(|c| {
                c.last_recurrence_id
                    .as_ref()
                    .is_some_and(|last| last.is_before(&max_date))
            })
            .cloned()
            .collect())
    }

    async fn mark_account_error(&self, account_id: &str, name: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let mut data = self.data.write();
        let account = data
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| StoreError::not_found("account", account_id))?;
        account.error = Some(ErrorMark::repeat(account.error.as_ref(), name, at));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self, transaction: Transaction) -> StoreResult<CommitReceipt> {
        let ops = transaction.into_ops();
        let receipt = CommitReceipt { writes: ops.len() };

        let mut data = self.data.write();
        for op in ops {
            data.apply(op);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(receipt)
    }
}
