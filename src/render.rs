//! TUI rendering for calsync-core types.

use calsync_core::provider::SyncOutcome;
use calsync_core::{Account, Calendar, Capabilities, SyncError};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for Account {
    fn render(&self) -> String {
        let id = self.id.as_deref().unwrap_or("?");
        let origin = if self.is_local() {
            "local".to_string()
        } else {
            self.entrypoint.clone().unwrap_or_default()
        };
        let line = format!("👤 {} {}", id.bold(), origin.dimmed());
        match &self.error {
            Some(mark) => format!("{line} {}", format!("({} x{})", mark.name, mark.count).red()),
            None => line,
        }
    }
}

impl Render for Calendar {
    fn render(&self) -> String {
        let name = if self.remote.name.is_empty() {
            &self.id
        } else {
            &self.remote.name
        };
        format!("📅 {}", name)
    }
}

impl Render for SyncOutcome {
    fn render(&self) -> String {
        match self {
            SyncOutcome::LocalCalendar => "local calendar, nothing to sync".dimmed().to_string(),
            SyncOutcome::UpToDate => "up to date".dimmed().to_string(),
            SyncOutcome::Synced(summary) if !summary.has_changes() => {
                "synced, no changes".dimmed().to_string()
            }
            SyncOutcome::Synced(summary) => format!(
                "{} {} {} {}",
                format!("+{}", summary.created).green(),
                format!("~{}", summary.updated).yellow(),
                format!("-{}", summary.removed).red(),
                format!("({} occurrences)", summary.occurrences).dimmed()
            ),
        }
    }
}

fn allowed(flag: bool) -> String {
    if flag {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}

impl Render for Capabilities {
    fn render(&self) -> String {
        format!(
            "   create: {}\n   update: {}\n   delete: {}",
            allowed(self.can_create),
            allowed(self.can_update),
            allowed(self.can_delete)
        )
    }
}

impl Render for SyncError {
    fn render(&self) -> String {
        let hint = if self.is_permanent() {
            " (fix the account before syncing again)"
        } else {
            ""
        };
        format!("{}{}", self.to_string().red(), hint.dimmed())
    }
}
