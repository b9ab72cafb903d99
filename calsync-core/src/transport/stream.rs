//! Push-model entity streams.
//!
//! A `RemoteStream` pairs a producer future (the "execute" half, which
//! resolves once the worker signals end-of-stream) with a channel the
//! producer pushes entities into while it runs. The channel closes when the
//! producer finishes and drops its `StreamSink`.

use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::{IcalComponent, RemoteEventRecord, RemoteOccurrence};
use crate::transport::TransportError;

/// An entity pushed by the worker during an event sync or recurrence expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum StreamEntity {
    /// A new or changed event, with its raw component and first occurrences.
    Event(StreamedEvent),
    /// A new or re-expanded recurrence component.
    Component(IcalComponent),
    /// One occurrence of an already known event.
    Occurrence(RemoteOccurrence),
    /// Local ids of cached events that no longer exist on the server.
    MissingEvents(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamedEvent {
    #[serde(flatten)]
    pub record: RemoteEventRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub occurrences: Vec<RemoteOccurrence>,
}

/// Producer half of a stream.
#[derive(Debug, Clone)]
pub struct StreamSink {
    entities: mpsc::UnboundedSender<StreamEntity>,
}

impl StreamSink {
    /// Returns false once the consumer has gone away.
    pub fn push(&self, entity: StreamEntity) -> bool {
        self.entities.send(entity).is_ok()
    }
}

pub struct RemoteStream {
    execute: BoxFuture<'static, Result<(), TransportError>>,
    entities: mpsc::UnboundedReceiver<StreamEntity>,
}

impl RemoteStream {
    /// Build a stream from a producer. The producer does not run until executed.
    pub fn new<F, Fut>(produce: F) -> Self
    where
        F: FnOnce(StreamSink) -> Fut,
        Fut: Future<Output = Result<(), TransportError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let execute = produce(StreamSink { entities: tx }).boxed();
        RemoteStream {
            execute,
            entities: rx,
        }
    }

    /// A stream that fails as soon as it is executed.
    pub fn failed(error: TransportError) -> Self {
        RemoteStream::new(move |_sink| async move { Err(error) })
    }

    pub fn into_parts(
        self,
    ) -> (
        BoxFuture<'static, Result<(), TransportError>>,
        mpsc::UnboundedReceiver<StreamEntity>,
    ) {
        (self.execute, self.entities)
    }
}

impl std::fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entities_arrive_before_channel_closes() {
        let stream = RemoteStream::new(|sink| async move {
            sink.push(StreamEntity::MissingEvents(vec!["cal1-a".into()]));
            sink.push(StreamEntity::MissingEvents(vec!["cal1-b".into()]));
            Ok(())
        });

        let (execute, mut entities) = stream.into_parts();
        let drain = async {
            let mut seen = Vec::new();
            while let Some(entity) = entities.recv().await {
                seen.push(entity);
            }
            seen
        };

        let (outcome, seen) = tokio::join!(execute, drain);
        assert!(outcome.is_ok());
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn failed_stream_reports_error() {
        let (execute, _entities) = RemoteStream::failed(TransportError::new("boom")).into_parts();
        assert_eq!(execute.await.unwrap_err().name, "boom");
    }

    #[test]
    fn missing_events_wire_format() {
        let json = r#"{"type":"missingEvents","data":["cal1-a"]}"#;
        let entity: StreamEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity, StreamEntity::MissingEvents(vec!["cal1-a".into()]));
    }
}
