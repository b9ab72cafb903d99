use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Calendar;

/// Provider-level id of the device-only account. Its calendars never sync.
pub const LOCAL_ACCOUNT_ID: &str = "local-first";

/// A remote calendar server, or the local-only sentinel account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Store identity. `None` until the account has been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Opaque to the engine; handed to the transport as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMark>,
}

impl Account {
    pub fn local(id: &str) -> Self {
        Account {
            id: Some(id.to_string()),
            account_id: LOCAL_ACCOUNT_ID.to_string(),
            entrypoint: None,
            user: None,
            credentials: None,
            error: None,
        }
    }

    pub fn remote(id: &str, account_id: &str, entrypoint: &str) -> Self {
        Account {
            id: Some(id.to_string()),
            account_id: account_id.to_string(),
            entrypoint: Some(entrypoint.to_string()),
            user: None,
            credentials: None,
            error: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.account_id == LOCAL_ACCOUNT_ID
    }
}

/// Durable record of a failure on an account or calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMark {
    pub name: String,
    pub date: DateTime<Utc>,
    /// How many times in a row this error was recorded.
    pub count: u32,
}

impl ErrorMark {
    pub fn new(name: &str, date: DateTime<Utc>) -> Self {
        ErrorMark {
            name: name.to_string(),
            date,
            count: 1,
        }
    }

    /// Record the error again, bumping the count when the kind is unchanged.
    pub fn repeat(previous: Option<&ErrorMark>, name: &str, date: DateTime<Utc>) -> Self {
        match previous {
            Some(prev) if prev.name == name => ErrorMark {
                name: name.to_string(),
                date,
                count: prev.count.saturating_add(1),
            },
            _ => ErrorMark::new(name, date),
        }
    }
}

/// Account details as reported by `getAccount`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_home: Option<String>,
}

/// Owning account/calendar pair of an event or calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct Owners {
    pub account: Account,
    pub calendar: Calendar,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_account_is_local() {
        assert!(Account::local("acct0").is_local());
        assert!(!Account::remote("acct1", "user@example.com", "https://dav.example.com").is_local());
    }

    #[test]
    fn repeated_error_mark_counts_up() {
        let now = Utc::now();
        let first = ErrorMark::new("authentication", now);
        let second = ErrorMark::repeat(Some(&first), "authentication", now);
        assert_eq!(second.count, 2);

        let other = ErrorMark::repeat(Some(&second), "invalid-server", now);
        assert_eq!(other.count, 1);
    }
}
