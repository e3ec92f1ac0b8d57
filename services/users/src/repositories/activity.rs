//! Activity log repository

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::{ActivitySummary, NewActivity, UserActivity};

/// Filters for an activity listing
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub activity_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Activity repository. Rows are only ever appended or pruned.
#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one activity row
    pub async fn insert(&self, activity: &NewActivity) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_activities
                (user_id, activity_type, activity_description, metadata, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5::inet, $6)
            "#,
        )
        .bind(activity.user_id)
        .bind(activity.activity_type.as_str())
        .bind(&activity.description)
        .bind(&activity.metadata)
        .bind(&activity.ip_address)
        .bind(&activity.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Page of a user's activities, newest first, with the filtered total
    pub async fn list(
        &self,
        user_id: i32,
        filter: &ActivityFilter,
    ) -> sqlx::Result<(Vec<UserActivity>, i64)> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT id, user_id, activity_type, activity_description, metadata,
                   host(ip_address) AS ip_address, user_agent, created_at
            FROM user_activities
            "#,
        );
        push_filter(&mut qb, user_id, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);
        let activities = qb
            .build_query_as::<UserActivity>()
            .fetch_all(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM user_activities");
        push_filter(&mut qb, user_id, filter);
        let total = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok((activities, total))
    }

    /// Count and latest timestamp per activity type since `since`
    pub async fn summary(
        &self,
        user_id: i32,
        since: DateTime<Utc>,
    ) -> sqlx::Result<Vec<ActivitySummary>> {
        sqlx::query_as::<_, ActivitySummary>(
            r#"
            SELECT activity_type, COUNT(*) AS count, MAX(created_at) AS last_activity
            FROM user_activities
            WHERE user_id = $1 AND created_at >= $2
            GROUP BY activity_type
            ORDER BY count DESC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
    }

    /// Delete rows created before `cutoff`, returning how many were removed
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM user_activities WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, user_id: i32, filter: &ActivityFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);

    if let Some(activity_type) = &filter.activity_type {
        qb.push(" AND activity_type = ")
            .push_bind(activity_type.clone());
    }
    if let Some(since) = filter.since {
        qb.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        qb.push(" AND created_at <= ").push_bind(until);
    }
}
