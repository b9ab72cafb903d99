use anyhow::Result;
use calsync_core::store::Store;
use owo_colors::OwoColorize;

use crate::render::Render;
use crate::state::State;

pub async fn run(state: &State) -> Result<()> {
    let accounts = state.store.accounts().await?;
    if accounts.is_empty() {
        println!("No accounts yet.");
        return Ok(());
    }

    for account in accounts {
        println!("{}", account.render());
        let Some(account_id) = account.id.as_deref() else {
            continue;
        };

        for calendar in state.store.calendars_for_account(account_id).await? {
            let last_sync = calendar
                .last_event_sync_date
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            let events = state.store.events_for_calendar(&calendar.id).await?.len();

            println!(
                "   {} {} {}",
                calendar.render(),
                calendar.id.dimmed(),
                format!("{events} events, last synced {last_sync}").dimmed()
            );
        }
    }

    Ok(())
}
