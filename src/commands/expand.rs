use anyhow::Result;
use calsync_core::SyncEngine;
use calsync_core::expansion::ExpansionOutcome;
use chrono::{Duration, Utc};
use owo_colors::OwoColorize;

pub async fn run(engine: &SyncEngine, days: i64) -> Result<()> {
    let max_date = Utc::now() + Duration::days(days);

    match engine.ensure_recurrences_expanded(max_date).await? {
        ExpansionOutcome::NothingToDo => {
            println!(
                "{}",
                format!("Recurrences already expanded through {}", max_date.date_naive()).dimmed()
            );
        }
        ExpansionOutcome::Expanded(calendars) => {
            for (calendar_id, summary) in &calendars {
                println!(
                    "📅 {} {}",
                    calendar_id,
                    format!("+{} occurrences", summary.occurrences).green()
                );
            }
        }
    }

    Ok(())
}
