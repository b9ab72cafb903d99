//! Provider-neutral data model shared by the engine, stores and transports.

mod account;
mod calendar;
mod date;
mod event;

pub use account::*;
pub use calendar::*;
pub use date::*;
pub use event::*;
