//! Error types for the sync engine.

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// Identifies the account/calendar an operation was running against when it failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    /// Persisted identity of the account, if it has one.
    pub account_id: Option<String>,
    pub calendar_id: Option<String>,
}

impl ErrorDetails {
    pub fn new(account_id: Option<&str>, calendar_id: Option<&str>) -> Self {
        ErrorDetails {
            account_id: account_id.map(String::from),
            calendar_id: calendar_id.map(String::from),
        }
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.account_id, &self.calendar_id) {
            (Some(account), Some(calendar)) => write!(f, "account {account}, calendar {calendar}"),
            (Some(account), None) => write!(f, "account {account}"),
            (None, Some(calendar)) => write!(f, "calendar {calendar}"),
            (None, None) => write!(f, "unknown account"),
        }
    }
}

/// Errors that can occur in sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Offline: no network connection available")]
    Offline,

    #[error("Authentication failed ({0})")]
    Authentication(ErrorDetails),

    #[error("Invalid server ({0})")]
    InvalidServer(ErrorDetails),

    #[error("Server failure ({0})")]
    ServerFailure(ErrorDetails),

    #[error("Remote error '{name}' ({details})")]
    Unknown { name: String, details: ErrorDetails },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Errors the user has to fix (credentials, server address) before a retry can succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SyncError::Authentication(_) | SyncError::InvalidServer(_)
        )
    }

    /// Stable name of the error kind, used for account/calendar error marks.
    pub fn name(&self) -> &str {
        match self {
            SyncError::Offline => "offline",
            SyncError::Authentication(_) => "authentication",
            SyncError::InvalidServer(_) => "invalid-server",
            SyncError::ServerFailure(_) => "server-failure",
            SyncError::Unknown { name, .. } => name,
            SyncError::Store(_) => "store",
            SyncError::Protocol(_) => "protocol",
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors() {
        let details = ErrorDetails::new(Some("acct1"), None);
        assert!(SyncError::Authentication(details.clone()).is_permanent());
        assert!(SyncError::InvalidServer(details.clone()).is_permanent());
        assert!(!SyncError::ServerFailure(details).is_permanent());
        assert!(!SyncError::Offline.is_permanent());
    }

    #[test]
    fn unknown_error_keeps_remote_name() {
        let err = SyncError::Unknown {
            name: "caldav-teapot".into(),
            details: ErrorDetails::default(),
        };
        assert_eq!(err.name(), "caldav-teapot");
        assert!(err.to_string().contains("caldav-teapot"));
    }

    #[test]
    fn details_display() {
        let details = ErrorDetails::new(Some("acct1"), Some("cal1"));
        assert_eq!(details.to_string(), "account acct1, calendar cal1");
    }
}
