use anyhow::Result;
use calsync_core::provider::SyncOutcome;
use calsync_core::store::{Store, Transaction};
use calsync_core::{Account, Calendar, SyncEngine};
use owo_colors::OwoColorize;

use crate::render::Render;
use crate::state::State;

pub async fn run(state: &State, engine: &SyncEngine, calendar_filter: Option<&str>) -> Result<()> {
    let accounts = state.store.accounts().await?;
    if accounts.is_empty() {
        println!("No accounts in {}", "state file".bold());
        return Ok(());
    }

    let mut failures = 0;
    for account in &accounts {
        println!("{}", account.render());

        if account.error.is_some() {
            println!("   {}", "skipped: account needs attention".red());
            continue;
        }

        let calendars = refresh_calendars(state, engine, account).await?;
        for calendar in calendars
            .iter()
            .filter(|c| calendar_filter.is_none_or(|id| c.id == id))
        {
            match engine.sync_events(account, calendar).await {
                Ok(outcome) => {
                    println!("   {} {}", calendar.render(), outcome.render());
                    if matches!(outcome, SyncOutcome::Synced(_)) {
                        record_calendar_token(state, &calendar.id).await?;
                    }
                }
                Err(e) => {
                    failures += 1;
                    println!("   {} {}", calendar.render(), e.render());
                }
            }
        }
    }

    if failures > 0 {
        println!("\n{} calendar(s) failed to sync", failures);
    }

    Ok(())
}

/// Update remote descriptors from the server, keeping local bookkeeping.
/// Falls back to the stored calendars when the list cannot be fetched.
async fn refresh_calendars(state: &State, engine: &SyncEngine, account: &Account) -> Result<Vec<Calendar>> {
    let Some(account_id) = account.id.as_deref() else {
        return Ok(Vec::new());
    };

    match engine.find_calendars(account).await {
        Ok(remotes) => {
            let mut tx = Transaction::new();
            for remote in remotes.into_values() {
                let id = Calendar::local_id(account_id, &remote.id);
                let calendar = match state.store.calendar(&id).await? {
                    Some(mut existing) => {
                        existing.remote = remote;
                        existing
                    }
                    None => Calendar::new(account_id, remote),
                };
                tx.persist_calendar(calendar);
            }
            state.store.commit(tx).await?;
        }
        Err(e) => {
            tracing::warn!(account = account_id, error = %e, "could not refresh calendar list");
            println!("   {}", e.render());
        }
    }

    Ok(state.store.calendars_for_account(account_id).await?)
}

/// The calendar-level token is ours to advance once its events are in.
async fn record_calendar_token(state: &State, calendar_id: &str) -> Result<()> {
    if let Some(mut calendar) = state.store.calendar(calendar_id).await? {
        calendar.last_sync_token = calendar.remote.sync_token.clone();
        let mut tx = Transaction::new();
        tx.persist_calendar(calendar);
        state.store.commit(tx).await?;
    }
    Ok(())
}
