use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ErrorMark;

/// WebDAV ACL privilege needed to create or modify events (RFC 3744).
pub const PRIVILEGE_WRITE_CONTENT: &str = "write-content";
/// WebDAV ACL privilege needed to delete events (RFC 3744).
pub const PRIVILEGE_UNBIND: &str = "unbind";

/// A collection of events belonging to one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: String,
    pub account_id: String,
    pub remote: RemoteCalendar,

    // Sync bookkeeping
    /// Calendar-level token recorded when the calendar list was last refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_sync_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_sync_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_event_sync_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMark>,
}

impl Calendar {
    pub fn new(account_id: &str, remote: RemoteCalendar) -> Self {
        Calendar {
            id: Self::local_id(account_id, &remote.id),
            account_id: account_id.to_string(),
            remote,
            last_sync_token: None,
            last_event_sync_token: None,
            last_event_sync_date: None,
            first_event_sync_date: None,
            error: None,
        }
    }

    /// Local calendar ids are `{accountId}-{remoteId}`.
    pub fn local_id(account_id: &str, remote_id: &str) -> String {
        format!("{account_id}-{remote_id}")
    }

    /// True when the remote token matches the one already recorded locally.
    pub fn is_current(&self) -> bool {
        self.last_sync_token == self.remote.sync_token
    }
}

/// Server-side description of a calendar collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCalendar {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    /// `None` when the server does not support access-control discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privilege_set: Option<Vec<String>>,
}

/// Create/update/delete permissions for a calendar (and its events).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Capabilities {
            can_create: true,
            can_update: true,
            can_delete: true,
        }
    }

    /// Derive permissions from a server-advertised privilege set.
    pub fn from_privileges(privilege_set: &[String]) -> Self {
        let write = privilege_set.iter().any(|p| p == PRIVILEGE_WRITE_CONTENT);
        let unbind = privilege_set.iter().any(|p| p == PRIVILEGE_UNBIND);
        Capabilities {
            can_create: write,
            can_update: write,
            can_delete: unbind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_content_without_unbind() {
        let caps = Capabilities::from_privileges(&["write-content".to_string()]);
        assert_eq!(
            caps,
            Capabilities {
                can_create: true,
                can_update: true,
                can_delete: false
            }
        );
    }

    #[test]
    fn unbind_only() {
        let caps = Capabilities::from_privileges(&["read".to_string(), "unbind".to_string()]);
        assert!(!caps.can_create);
        assert!(!caps.can_update);
        assert!(caps.can_delete);
    }

    #[test]
    fn missing_tokens_count_as_current() {
        let calendar = Calendar::new("acct1", RemoteCalendar::default());
        assert!(calendar.is_current());
    }

    #[test]
    fn calendar_id_is_scoped_by_account() {
        let remote = RemoteCalendar {
            id: "work".into(),
            ..Default::default()
        };
        assert_eq!(Calendar::new("acct1", remote).id, "acct1-work");
    }
}
