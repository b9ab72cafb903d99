use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::TransportDate;

/// A single calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub calendar_id: String,
    pub remote: RemoteEvent,
}

impl Event {
    pub fn new(calendar_id: &str, remote: RemoteEvent) -> Self {
        Event {
            id: Self::local_id(calendar_id, &remote.id),
            calendar_id: calendar_id.to_string(),
            remote,
        }
    }

    /// Local event ids are `{calendarId}-{remoteId}`.
    pub fn local_id(calendar_id: &str, remote_id: &str) -> String {
        format!("{calendar_id}-{remote_id}")
    }
}

/// Server-side description of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Per-resource token (etag); changes whenever the server copy changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start_date: TransportDate,
    pub end_date: TransportDate,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alarms: Vec<AlarmTrigger>,
}

/// Alarm definition relative to an occurrence start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmTrigger {
    #[serde(default = "default_alarm_action")]
    pub action: String,
    /// Seconds relative to the occurrence start (negative = before).
    pub trigger: i64,
}

fn default_alarm_action() -> String {
    "DISPLAY".to_string()
}

/// A materialized occurrence interval of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Busytime {
    pub id: String,
    pub event_id: String,
    pub calendar_id: String,
    pub start_date: TransportDate,
    pub end_date: TransportDate,
}

impl Busytime {
    pub fn new(
        event_id: &str,
        calendar_id: &str,
        start_date: TransportDate,
        end_date: TransportDate,
    ) -> Self {
        Busytime {
            id: format!("{}-{}", event_id, start_date.utc),
            event_id: event_id.to_string(),
            calendar_id: calendar_id.to_string(),
            start_date,
            end_date,
        }
    }

    /// The occurrence spanning the event's own start and end.
    pub fn primary(event: &Event) -> Self {
        Busytime::new(
            &event.id,
            &event.calendar_id,
            event.remote.start_date.clone(),
            event.remote.end_date.clone(),
        )
    }

    /// Alarms for this occurrence. Triggers that land outside the
    /// representable time range are dropped.
    pub fn alarms(&self, triggers: &[AlarmTrigger]) -> Vec<Alarm> {
        triggers
            .iter()
            .filter_map(|trigger| {
                let alarm = Alarm::for_busytime(self, trigger);
                if alarm.is_none() {
                    warn!(busytime = %self.id, trigger = trigger.trigger, "dropping out-of-range alarm");
                }
                alarm
            })
            .collect()
    }
}

/// A concrete alarm firing time for one occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub event_id: String,
    pub busytime_id: String,
    pub action: String,
    pub start_date: TransportDate,
}

impl Alarm {
    /// `None` when the firing time overflows.
    pub fn for_busytime(busytime: &Busytime, trigger: &AlarmTrigger) -> Option<Self> {
        let utc = trigger
            .trigger
            .checked_mul(1000)
            .and_then(|offset| busytime.start_date.utc.checked_add(offset))?;
        let start_date = TransportDate {
            utc,
            ..busytime.start_date.clone()
        };
        Some(Alarm {
            id: format!("{}-{}", busytime.id, trigger.trigger),
            event_id: busytime.event_id.clone(),
            busytime_id: busytime.id.clone(),
            action: trigger.action.clone(),
            start_date,
        })
    }
}

/// Raw recurrence payload of an event, stored apart from the event itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcalComponent {
    pub event_id: String,
    pub calendar_id: String,
    pub ical: String,
    /// Start of the last occurrence expanded so far; `None` for single events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_recurrence_id: Option<TransportDate>,
}

/// Event record returned by the transport for create/update and inside event streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventRecord {
    #[serde(flatten)]
    pub event: RemoteEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ical_component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_recurrence_id: Option<TransportDate>,
}

impl RemoteEventRecord {
    /// Split the raw ical payload out of the record into its own component.
    pub fn into_parts(self, event_id: &str, calendar_id: &str) -> (RemoteEvent, Option<IcalComponent>) {
        let RemoteEventRecord {
            event,
            ical_component,
            last_recurrence_id,
        } = self;

        let component = ical_component.map(|ical| {
            // Recurring events are expanded forward from their first occurrence.
            let last_recurrence_id = last_recurrence_id
                .or_else(|| event.is_recurring.then(|| event.start_date.clone()));
            IcalComponent {
                event_id: event_id.to_string(),
                calendar_id: calendar_id.to_string(),
                ical,
                last_recurrence_id,
            }
        });

        (event, component)
    }
}

/// One occurrence produced by the transport (event sync or recurrence expansion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOccurrence {
    /// Local event id. Omitted for occurrences nested inside an event entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub start_date: TransportDate,
    pub end_date: TransportDate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alarms: Vec<AlarmTrigger>,
}

/// What the local cache knows about a remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
}

/// Locally known events of one calendar keyed by remote URL.
pub type SyncCache = BTreeMap<String, CachedEvent>;

/// Build the sync cache from a calendar's stored events. Events without a URL are skipped.
pub fn sync_cache<'a>(events: impl IntoIterator<Item = &'a Event>) -> SyncCache {
    events
        .into_iter()
        .filter_map(|event| {
            event.remote.url.as_ref().map(|url| {
                (
                    url.clone(),
                    CachedEvent {
                        id: event.id.clone(),
                        sync_token: event.remote.sync_token.clone(),
                    },
                )
            })
        })
        .collect()
}

/// Result of a committed create/update.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub event: Event,
    pub busytime: Busytime,
}
