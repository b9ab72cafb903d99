use anyhow::Result;
use calsync_core::SyncEngine;
use calsync_core::store::Store;

use crate::render::Render;
use crate::state::State;

pub async fn run(state: &State, engine: &SyncEngine, calendar_id: &str) -> Result<()> {
    let Some(calendar) = state.store.calendar(calendar_id).await? else {
        let mut available = Vec::new();
        for account in state.store.accounts().await? {
            if let Some(id) = account.id.as_deref() {
                for calendar in state.store.calendars_for_account(id).await? {
                    available.push(calendar.id);
                }
            }
        }
        anyhow::bail!(
            "Calendar '{}' not found. Available: {}",
            calendar_id,
            available.join(", ")
        );
    };

    let capabilities = engine.calendar_capabilities(&calendar).await?;
    println!("{}", calendar.render());
    println!("{}", capabilities.render());

    Ok(())
}
