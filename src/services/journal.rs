//! Daily wellness logs and the views built from them

use crate::error::{Result, StackShareError};
use crate::insights::{
    compute_streaks, compute_trends, recent_intensity, year_calendar, CalendarGrid, DayIntensity,
    Streaks, Trends,
};
use crate::services::stacks::can_view;
use crate::storage::{LogUpsert, StorageBackend};
use crate::types::{DailyLog, LogEntry, LogId, StackId, StackWithRelations, UserId};
use crate::utils::string::blank_to_none;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything on the dashboard home page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub streaks: Streaks,
    pub calendar: CalendarGrid,
    /// Distinct logged dates inside the calendar range, ascending
    pub active_dates: Vec<NaiveDate>,
    pub recent: Vec<DayIntensity>,
    pub total_logs: usize,
    pub stacks: Vec<StackWithRelations>,
}

pub struct JournalService {
    storage: Arc<dyn StorageBackend>,
}

impl JournalService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Upsert the log keyed by (user, date, stack); date defaults to `today`
    pub async fn record(&self, user: UserId, entry: LogEntry, today: NaiveDate) -> Result<DailyLog> {
        entry.ratings.validate()?;

        if let Some(stack_id) = entry.stack_id {
            match self.storage.get_stack(stack_id).await? {
                Some(stack) if can_view(&stack, Some(user)) => {}
                _ => return Err(StackShareError::NotFound(format!("Stack {}", stack_id))),
            }
        }

        let upsert = LogUpsert {
            user_id: user,
            stack_id: entry.stack_id,
            date: entry.date.unwrap_or(today),
            ratings: entry.ratings,
            notes: blank_to_none(entry.notes),
            side_effects: blank_to_none(entry.side_effects),
            items_taken: entry.items_taken,
        };

        let log = self.storage.upsert_log(&upsert, Utc::now()).await?;
        info!("Saved log {} for user {} on {}", log.id, user, log.date);
        Ok(log)
    }

    /// Today's log against one stack
    pub async fn check_in(
        &self,
        user: UserId,
        stack: StackId,
        entry: LogEntry,
        today: NaiveDate,
    ) -> Result<DailyLog> {
        let entry = LogEntry {
            stack_id: Some(stack),
            ..entry
        };
        self.record(user, entry, today).await
    }

    /// Delete one of the user's own logs (`NotFound` for anyone else's)
    pub async fn delete(&self, user: UserId, id: LogId) -> Result<()> {
        match self.storage.get_log(id).await? {
            Some(log) if log.user_id == user => {
                self.storage.delete_log(id).await?;
                debug!("Deleted log {}", id);
                Ok(())
            }
            _ => Err(StackShareError::NotFound(format!("Log {}", id))),
        }
    }

    /// Newest date first
    pub async fn list(&self, user: UserId) -> Result<Vec<DailyLog>> {
        self.storage.list_user_logs(user).await
    }

    pub async fn on_date(&self, user: UserId, date: NaiveDate) -> Result<Vec<DailyLog>> {
        let logs = self.storage.logs_on_date(user, date).await?;
        if logs.is_empty() {
            return Err(StackShareError::NotFound(format!("No logs on {}", date)));
        }
        Ok(logs)
    }

    pub async fn trends(&self, user: UserId) -> Result<Trends> {
        let logs = self.storage.list_user_logs(user).await?;
        Ok(compute_trends(&logs))
    }

    pub async fn dashboard(&self, user: UserId, today: NaiveDate) -> Result<Dashboard> {
        let logs = self.storage.list_user_logs(user).await?;
        let stacks = self.storage.list_user_stacks(user).await?;

        let dates: BTreeSet<NaiveDate> = logs.iter().map(|l| l.date).collect();
        let calendar = year_calendar(today);
        let first_day = calendar.weeks.first().and_then(|w| w.first()).copied();
        let active_dates = dates
            .iter()
            .copied()
            .filter(|d| first_day.map_or(false, |first| *d >= first) && *d <= today)
            .collect();
        let all_dates: Vec<NaiveDate> = logs.iter().map(|l| l.date).collect();

        Ok(Dashboard {
            streaks: compute_streaks(dates.iter().copied(), today),
            calendar,
            active_dates,
            recent: recent_intensity(&all_dates, today),
            total_logs: logs.len(),
            stacks,
        })
    }
}
