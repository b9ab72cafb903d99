//! Maps worker error codes to typed errors.
//!
//! Authentication and invalid-server failures are permanent: the account is
//! marked so schedulers can stop retrying until the user fixes it.

use std::sync::Arc;

use tracing::warn;

use crate::clock::Clock;
use crate::error::{ErrorDetails, SyncError};
use crate::store::Store;
use crate::transport::TransportError;

#[derive(Clone)]
pub struct ErrorClassifier {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ErrorClassifier {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        ErrorClassifier { store, clock }
    }

    /// Pure mapping, without the account-marking side effect.
    pub fn kind_of(err: &TransportError, details: &ErrorDetails) -> SyncError {
        let code = err.name.strip_prefix("caldav-").unwrap_or(&err.name);
        match code {
            "authentication" => SyncError::Authentication(details.clone()),
            "invalid-entrypoint" => SyncError::InvalidServer(details.clone()),
            "server-failure" => SyncError::ServerFailure(details.clone()),
            _ => SyncError::Unknown {
                name: err.name.clone(),
                details: details.clone(),
            },
        }
    }

    pub async fn classify(&self, err: TransportError, details: &ErrorDetails) -> SyncError {
        let error = Self::kind_of(&err, details);
        warn!(error = %err, %details, "transport call failed");

        if error.is_permanent() {
            if let Some(account_id) = &details.account_id {
                match self
                    .store
                    .mark_account_error(account_id, error.name(), self.clock.now())
                    .await
                {
                    Ok(()) => warn!(account = %account_id, kind = error.name(), "account marked with permanent error"),
                    Err(mark_err) => warn!(account = %account_id, error = %mark_err, "failed to mark account"),
                }
            }
        }

        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::model::Account;
    use crate::store::MemoryStore;

    fn classifier(store: Arc<MemoryStore>) -> ErrorClassifier {
        ErrorClassifier::new(store, Arc::new(SystemClock))
    }

    #[test]
    fn maps_known_codes() {
        let details = ErrorDetails::default();
        assert!(matches!(
            ErrorClassifier::kind_of(&TransportError::new("caldav-authentication"), &details),
            SyncError::Authentication(_)
        ));
        assert!(matches!(
            ErrorClassifier::kind_of(&TransportError::new("caldav-invalid-entrypoint"), &details),
            SyncError::InvalidServer(_)
        ));
        assert!(matches!(
            ErrorClassifier::kind_of(&TransportError::new("server-failure"), &details),
            SyncError::ServerFailure(_)
        ));
        assert!(matches!(
            ErrorClassifier::kind_of(&TransportError::new("caldav-teapot"), &details),
            SyncError::Unknown { name, .. } if name == "caldav-teapot"
        ));
    }

    #[tokio::test]
    async fn authentication_marks_account() {
        let store = Arc::new(MemoryStore::new());
        store.insert_account(Account::remote("acct1", "me", "https://dav.example.com"));

        let details = ErrorDetails::new(Some("acct1"), None);
        let err = classifier(store.clone())
            .classify(TransportError::new("caldav-authentication"), &details)
            .await;

        assert!(matches!(err, SyncError::Authentication(_)));
        let account = store.account("acct1").await.unwrap().unwrap();
        assert_eq!(account.error.unwrap().name, "authentication");
    }

    #[tokio::test]
    async fn transient_errors_leave_store_alone() {
        let store = Arc::new(MemoryStore::new());
        store.insert_account(Account::remote("acct1", "me", "https://dav.example.com"));

        let details = ErrorDetails::new(Some("acct1"), None);
        let err = classifier(store.clone())
            .classify(TransportError::new("caldav-server-failure"), &details)
            .await;

        assert!(matches!(err, SyncError::ServerFailure(_)));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn unpersisted_account_is_not_marked() {
        let store = Arc::new(MemoryStore::new());
        let err = classifier(store.clone())
            .classify(TransportError::new("caldav-invalid-entrypoint"), &ErrorDetails::default())
            .await;

        assert!(matches!(err, SyncError::InvalidServer(_)));
        assert_eq!(store.writes(), 0);
    }
}
