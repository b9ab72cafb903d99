//! Write batches applied atomically by a store.

use crate::model::{Alarm, Busytime, Calendar, Event, IcalComponent};

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    PutEvent(Event),
    /// Removes the event with its busytimes, alarms and ical component.
    RemoveEvent(String),
    /// Removes the busytimes and alarms of an event, keeping the event itself.
    ClearOccurrences(String),
    PutBusytime(Busytime),
    PutAlarm(Alarm),
    PutComponent(IcalComponent),
    PutCalendar(Calendar),
}

/// Ordered list of writes. Ops are applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    ops: Vec<WriteOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction::default()
    }

    pub fn persist_event(&mut self, event: Event) -> &mut Self {
        self.ops.push(WriteOp::PutEvent(event));
        self
    }

    pub fn remove_event(&mut self, event_id: &str) -> &mut Self {
        self.ops.push(WriteOp::RemoveEvent(event_id.to_string()));
        self
    }

    pub fn clear_occurrences(&mut self, event_id: &str) -> &mut Self {
        self.ops.push(WriteOp::ClearOccurrences(event_id.to_string()));
        self
    }

    pub fn persist_busytime(&mut self, busytime: Busytime) -> &mut Self {
        self.ops.push(WriteOp::PutBusytime(busytime));
        self
    }

    pub fn persist_alarm(&mut self, alarm: Alarm) -> &mut Self {
        self.ops.push(WriteOp::PutAlarm(alarm));
        self
    }

    pub fn persist_component(&mut self, component: IcalComponent) -> &mut Self {
        self.ops.push(WriteOp::PutComponent(component));
        self
    }

    pub fn persist_calendar(&mut self, calendar: Calendar) -> &mut Self {
        self.ops.push(WriteOp::PutCalendar(calendar));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
