//! Recurrence expansion driver.
//!
//! Finds recurring components whose expanded horizon lies before a target
//! date and asks the worker to expand them, one stream per calendar. Each
//! calendar commits on its own: a failing calendar does not roll back, or
//! cancel, the others.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::engine::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::model::{IcalComponent, TransportDate};
use crate::pipeline::{PullSummary, StreamDetails, StreamPipeline};
use crate::transport::TransportRequest;
use crate::transport::protocol::{ExpandComponents, ExpandOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// No component needed expanding; no request was made.
    NothingToDo,
    /// Per-calendar summaries of what was committed.
    Expanded(BTreeMap<String, PullSummary>),
}

/// Group components by owning calendar, keeping their order within a group.
pub fn group_by_calendar(components: Vec<IcalComponent>) -> BTreeMap<String, Vec<IcalComponent>> {
    let mut groups: BTreeMap<String, Vec<IcalComponent>> = BTreeMap::new();
    for component in components {
        groups
            .entry(component.calendar_id.clone())
            .or_default()
            .push(component);
    }
    groups
}

#[derive(Clone)]
pub struct RecurrenceExpander {
    ctx: SyncContext,
    pipeline: StreamPipeline,
}

impl RecurrenceExpander {
    pub fn new(ctx: SyncContext) -> Self {
        let pipeline = StreamPipeline::new(ctx.store.clone(), ctx.classifier());
        RecurrenceExpander { ctx, pipeline }
    }

    pub async fn ensure_recurrences_expanded(&self, max_date: DateTime<Utc>) -> SyncResult<ExpansionOutcome> {
        let components = self.ctx.store.find_recurrences_before(max_date).await?;
        if components.is_empty() {
            debug!(%max_date, "no recurrences to expand");
            return Ok(ExpansionOutcome::NothingToDo);
        }

        let max_date = TransportDate::from(max_date);
        let expansions = group_by_calendar(components)
            .into_iter()
            .map(|(calendar_id, components)| {
                let max_date = max_date.clone();
                async move {
                    let result = self.expand_calendar(&calendar_id, components, max_date).await;
                    (calendar_id, result)
                }
            });

        let mut expanded = BTreeMap::new();
        let mut failure: Option<SyncError> = None;
        for (calendar_id, result) in join_all(expansions).await {
            match result {
                Ok(summary) => {
                    expanded.insert(calendar_id, summary);
                }
                Err(err) => {
                    warn!(calendar = %calendar_id, error = %err, "recurrence expansion failed");
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(ExpansionOutcome::Expanded(expanded)),
        }
    }

    #[instrument(skip(self, components, max_date), fields(components = components.len()))]
    async fn expand_calendar(
        &self,
        calendar_id: &str,
        components: Vec<IcalComponent>,
        max_date: TransportDate,
    ) -> SyncResult<PullSummary> {
        let owners = match self.ctx.store.owners_of_calendar(calendar_id).await {
            Ok(owners) => owners,
            Err(err) => {
                let orphans: Vec<&str> = components.iter().map(|c| c.event_id.as_str()).collect();
                warn!(
                    calendar = %calendar_id,
                    components = ?orphans,
                    error = %err,
                    "cannot resolve owners of recurring components"
                );
                return Err(err.into());
            }
        };

        let command = ExpandComponents {
            components,
            options: ExpandOptions { max_date },
        };
        let stream = self.ctx.transport.stream(TransportRequest::new(&command)?);

        let details = StreamDetails::expansion(owners.account, owners.calendar);
        self.pipeline.consume(stream, &details).await
    }
}
