//! Best-effort activity audit log
//!
//! Recording never blocks or fails the request that triggered it: the insert
//! runs on its own task and failures are only logged.

use chrono::{DateTime, Duration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::models::{ActivitySummary, NewActivity, UserActivity};
use crate::repositories::ActivityRepository;
use crate::repositories::activity::ActivityFilter;

/// Activity log service
#[derive(Clone)]
pub struct ActivityLog {
    repository: ActivityRepository,
}

impl ActivityLog {
    pub fn new(repository: ActivityRepository) -> Self {
        Self { repository }
    }

    /// Append an entry without waiting for it
    pub fn record(&self, activity: NewActivity) {
        let repository = self.repository.clone();
        tokio::spawn(async move {
            if let Err(e) = repository.insert(&activity).await {
                warn!(
                    "Failed to log {} activity for user {}: {}",
                    activity.activity_type, activity.user_id, e
                );
            }
        });
    }

    /// Page of a user's activities and the total matching the filter
    pub async fn list(
        &self,
        user_id: i32,
        filter: &ActivityFilter,
    ) -> sqlx::Result<(Vec<UserActivity>, i64)> {
        self.repository.list(user_id, filter).await
    }

    /// Activity counts per type over the last `days` days
    pub async fn summary(&self, user_id: i32, days: u32) -> sqlx::Result<Vec<ActivitySummary>> {
        self.repository.summary(user_id, days_ago(days)).await
    }

    /// Delete entries older than `days_to_keep` days
    pub async fn prune_older_than(&self, days_to_keep: u32) -> sqlx::Result<u64> {
        let deleted = self.repository.delete_older_than(days_ago(days_to_keep)).await?;
        info!("Cleaned {} old activity records", deleted);
        Ok(deleted)
    }
}

/// Longest look-back window, in days
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// The instant `days` days ago, with `days` capped at [`MAX_WINDOW_DAYS`]
fn days_ago(days: u32) -> DateTime<Utc> {
    Utc::now() - Duration::days(i64::from(days.min(MAX_WINDOW_DAYS)))
}

/// Schedule periodic pruning on `schedule` (a six-field cron expression)
pub async fn start_prune_schedule(
    activity_log: ActivityLog,
    schedule: &str,
    days_to_keep: u32,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let activity_log = activity_log.clone();
        Box::pin(async move {
            if let Err(e) = activity_log.prune_older_than(days_to_keep).await {
                error!("Activity prune failed: {}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("Activity pruning scheduled: {}", schedule);

    Ok(scheduler)
}
