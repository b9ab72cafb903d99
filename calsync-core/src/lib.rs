//! Core of the calsync ecosystem: the CalDAV synchronization engine.
//!
//! - `engine` is the entry point: it picks a provider per account and exposes
//!   event sync, recurrence expansion, event mutations and capability queries.
//! - `transport` describes the request/stream protocol spoken with the remote
//!   worker, `store` the local storage seen through transactional commits.
//! - `pipeline` turns a remote entity stream into one atomic commit.

pub mod classify;
pub mod clock;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod expansion;
pub mod model;
pub mod mutations;
pub mod pipeline;
pub mod provider;
pub mod store;
pub mod testing;
pub mod transport;

pub use engine::{SyncContext, SyncEngine};
pub use error::{ErrorDetails, SyncError, SyncResult};
pub use model::*;
