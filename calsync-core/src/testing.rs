//! Test doubles shared by unit and integration tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Barrier;

use crate::model::{RemoteCalendar, RemoteEvent, RemoteEventRecord, TransportDate};
use crate::transport::stream::StreamedEvent;
use crate::transport::{Method, RemoteStream, StreamEntity, Transport, TransportError, TransportRequest};

/// A scripted streaming response.
#[derive(Debug, Clone)]
pub struct ScriptedStream {
    pub entities: Vec<StreamEntity>,
    pub outcome: Result<(), TransportError>,
    /// When set, the producer waits here after pushing its entities.
    pub barrier: Option<Arc<Barrier>>,
}

impl ScriptedStream {
    pub fn ok(entities: Vec<StreamEntity>) -> Self {
        ScriptedStream {
            entities,
            outcome: Ok(()),
            barrier: None,
        }
    }

    pub fn failing(entities: Vec<StreamEntity>, error: TransportError) -> Self {
        ScriptedStream {
            entities,
            outcome: Err(error),
            barrier: None,
        }
    }

    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }
}

/// Transport answering from per-method queues and recording every call.
/// Calls with nothing scripted fail with `unscripted-call`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    requests: Mutex<BTreeMap<String, VecDeque<Result<serde_json::Value, TransportError>>>>,
    streams: Mutex<BTreeMap<String, VecDeque<ScriptedStream>>>,
    calls: Mutex<Vec<TransportRequest>>,
}

fn key(method: Method) -> String {
    format!("{method:?}")
}

impl ScriptedTransport {
    pub fn new() -> Self {
        ScriptedTransport::default()
    }

    pub fn respond(&self, method: Method, response: Result<serde_json::Value, TransportError>) {
        self.requests
            .lock()
            .entry(key(method))
            .or_default()
            .push_back(response);
    }

    pub fn respond_stream(&self, method: Method, stream: ScriptedStream) {
        self.streams
            .lock()
            .entry(key(method))
            .or_default()
            .push_back(stream);
    }

    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: Method) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    fn record(&self, request: &TransportRequest) {
        self.calls.lock().push(request.clone());
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError> {
        self.record(&request);
        self.requests
            .lock()
            .get_mut(&key(request.method))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(TransportError::new("unscripted-call")))
    }

    fn stream(&self, request: TransportRequest) -> RemoteStream {
        self.record(&request);
        let scripted = self
            .streams
            .lock()
            .get_mut(&key(request.method))
            .and_then(VecDeque::pop_front);

        let Some(scripted) = scripted else {
            return RemoteStream::failed(TransportError::new("unscripted-call"));
        };

        RemoteStream::new(move |sink| async move {
            for entity in scripted.entities {
                sink.push(entity);
            }
            if let Some(barrier) = scripted.barrier {
                barrier.wait().await;
            }
            scripted.outcome
        })
    }
}

/// Remote calendar descriptor with the given server token.
pub fn remote_calendar(id: &str, sync_token: Option<&str>) -> RemoteCalendar {
    RemoteCalendar {
        id: id.to_string(),
        url: Some(format!("/calendars/{id}/")),
        name: id.to_string(),
        sync_token: sync_token.map(str::to_string),
        ..Default::default()
    }
}

/// A one-hour, non-recurring remote event starting at `start_ms`.
pub fn remote_event(id: &str, title: &str, start_ms: i64) -> RemoteEvent {
    RemoteEvent {
        id: id.to_string(),
        url: Some(format!("/calendars/home/{id}.ics")),
        sync_token: Some("1".to_string()),
        title: title.to_string(),
        description: None,
        location: None,
        start_date: TransportDate {
            utc: start_ms,
            offset: 0,
            tzid: None,
        },
        end_date: TransportDate {
            utc: start_ms + 3_600_000,
            offset: 0,
            tzid: None,
        },
        is_recurring: false,
        alarms: Vec::new(),
    }
}

/// Worker record for `event`, carrying a minimal ical body.
pub fn event_record(event: RemoteEvent) -> RemoteEventRecord {
    let ical = format!(
        "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:{}\r\nSUMMARY:{}\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        event.id, event.title
    );
    RemoteEventRecord {
        event,
        ical_component: Some(ical),
        last_recurrence_id: None,
    }
}

/// Stream entity announcing `event` with no explicit occurrences.
pub fn streamed_event(event: RemoteEvent) -> StreamEntity {
    StreamEntity::Event(StreamedEvent {
        record: event_record(event),
        occurrences: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::protocol::GetAccount;
    use crate::model::Account;

    #[tokio::test]
    async fn unscripted_calls_fail_and_are_recorded() {
        let transport = ScriptedTransport::new();
        let request = TransportRequest::new(&GetAccount {
            account: Account::remote("acct1", "me", "https://dav.example.com"),
        })
        .unwrap();

        let err = transport.request(request).await.unwrap_err();
        assert_eq!(err.name, "unscripted-call");
        assert_eq!(transport.calls_to(Method::GetAccount), 1);
    }

    #[tokio::test]
    async fn responses_are_served_in_order() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::GetAccount, Ok(serde_json::json!({ "accountId": "first" })));
        transport.respond(Method::GetAccount, Err(TransportError::new("caldav-server-failure")));

        let request = TransportRequest::new(&GetAccount {
            account: Account::remote("acct1", "me", "https://dav.example.com"),
        })
        .unwrap();

        assert!(transport.request(request.clone()).await.is_ok());
        assert_eq!(
            transport.request(request).await.unwrap_err().name,
            "caldav-server-failure"
        );
    }
}
