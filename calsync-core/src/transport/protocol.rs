//! Typed commands sent to the CalDAV worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;

use crate::model::{
    Account, AccountInfo, IcalComponent, RemoteCalendar, RemoteEvent, RemoteEventRecord,
    SyncCache, TransportDate,
};
use crate::transport::StreamEntity;

pub const CALDAV_DOMAIN: &str = "caldav";

/// A command the worker understands.
///
/// `Response` is what comes back: the decoded result of a request, or the
/// entity type pushed by a stream.
pub trait TransportCommand: Serialize {
    type Response: DeserializeOwned;
    fn method() -> Method;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    GetAccount,
    FindCalendars,
    StreamEvents,
    ExpandComponents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
}

/// Whether the worker should write through to the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncOptions {
    pub sync: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetAccount {
    pub account: Account,
}

impl TransportCommand for GetAccount {
    type Response = AccountInfo;
    fn method() -> Method {
        Method::GetAccount
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FindCalendars {
    pub account: Account,
}

impl TransportCommand for FindCalendars {
    type Response = BTreeMap<String, RemoteCalendar>;
    fn method() -> Method {
        Method::FindCalendars
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEventsOptions {
    pub start_date: DateTime<Utc>,
    pub cached: SyncCache,
}

/// Stream every event changed since the cached state, from `start_date` on.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamEvents {
    pub account: Account,
    pub calendar: RemoteCalendar,
    pub options: StreamEventsOptions,
}

impl TransportCommand for StreamEvents {
    type Response = StreamEntity;
    fn method() -> Method {
        Method::StreamEvents
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandOptions {
    pub max_date: TransportDate,
}

/// Expand a batch of one calendar's recurring components up to `max_date`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExpandComponents {
    pub components: Vec<IcalComponent>,
    pub options: ExpandOptions,
}

impl TransportCommand for ExpandComponents {
    type Response = StreamEntity;
    fn method() -> Method {
        Method::ExpandComponents
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    pub account: Account,
    pub calendar: RemoteCalendar,
    pub event: RemoteEvent,
    pub options: SyncOptions,
}

impl TransportCommand for CreateEvent {
    type Response = RemoteEventRecord;
    fn method() -> Method {
        Method::CreateEvent
    }
}

/// Update payload: the server needs the full recurrence data to compute its diff.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    pub event: RemoteEvent,
    pub ical_component: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub account: Account,
    pub calendar: RemoteCalendar,
    pub event: UpdatePayload,
    pub options: SyncOptions,
}

impl TransportCommand for UpdateEvent {
    type Response = RemoteEventRecord;
    fn method() -> Method {
        Method::UpdateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    pub account: Account,
    pub calendar: RemoteCalendar,
    pub event: RemoteEvent,
    pub options: SyncOptions,
}

impl TransportCommand for DeleteEvent {
    type Response = serde_json::Value;
    fn method() -> Method {
        Method::DeleteEvent
    }
}
