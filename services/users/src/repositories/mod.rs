//! Repositories for database operations

use chrono::NaiveDate;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, postgres::PgRow};

pub mod activity;
pub mod mental_health;
pub mod preferences;
pub mod profile;
pub mod user;

pub use activity::ActivityRepository;
pub use mental_health::MentalHealthRepository;
pub use preferences::PreferencesRepository;
pub use profile::ProfileRepository;
pub use user::UserRepository;

/// Value written to one column of a partial update
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Flag(bool),
    Int(Option<i32>),
    TextList(Vec<String>),
    Json(Option<Value>),
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: ColumnValue) {
    match value {
        ColumnValue::Text(v) => qb.push_bind(v),
        ColumnValue::Date(v) => qb.push_bind(v),
        ColumnValue::Flag(v) => qb.push_bind(v),
        ColumnValue::Int(v) => qb.push_bind(v),
        ColumnValue::TextList(v) => qb.push_bind(v),
        ColumnValue::Json(v) => qb.push_bind(v),
    };
}

/// Make sure the 1:1 child row of `user_id` exists and return it.
///
/// Missing rows are created with every column at its default.
async fn ensure_row<T>(pool: &PgPool, table: &'static str, user_id: i32) -> sqlx::Result<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let insert = format!(
        "INSERT INTO {} (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        table
    );
    sqlx::query(&insert).bind(user_id).execute(pool).await?;

    let select = format!("SELECT * FROM {} WHERE user_id = $1", table);
    sqlx::query_as::<_, T>(&select)
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Build `INSERT .. ON CONFLICT (user_id) DO UPDATE` writing only `columns`
fn build_upsert(
    table: &'static str,
    user_id: i32,
    columns: Vec<(&'static str, ColumnValue)>,
) -> QueryBuilder<'static, Postgres> {
    let names: Vec<&'static str> = columns.iter().map(|(name, _)| *name).collect();

    let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO {} (user_id", table));
    for name in &names {
        qb.push(", ").push(*name);
    }
    qb.push(") VALUES (").push_bind(user_id);
    for (_, value) in columns {
        qb.push(", ");
        push_value(&mut qb, value);
    }
    qb.push(") ON CONFLICT (user_id) DO UPDATE SET ");
    {
        let mut assignments = qb.separated(", ");
        for name in &names {
            assignments.push(format!("{0} = EXCLUDED.{0}", name));
        }
    }
    qb.push(" RETURNING *");
    qb
}

/// Insert-or-update the 1:1 child row of `user_id` in a single statement.
///
/// Only the given columns are written. On insert the others take their
/// defaults; on conflict the others are left as they are. Two concurrent
/// writers for the same user both succeed, last write wins per column.
async fn upsert_columns<T>(
    pool: &PgPool,
    table: &'static str,
    user_id: i32,
    columns: Vec<(&'static str, ColumnValue)>,
) -> sqlx::Result<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    if columns.is_empty() {
        return ensure_row(pool, table, user_id).await;
    }

    let mut qb = build_upsert(table, user_id, columns);
    qb.build_query_as::<T>().fetch_one(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_writes_only_given_columns() {
        let qb = build_upsert(
            "user_preferences",
            3,
            vec![
                ("theme", ColumnValue::Text(Some("dark".into()))),
                ("sms_notifications", ColumnValue::Flag(true)),
            ],
        );

        assert_eq!(
            qb.sql(),
            "INSERT INTO user_preferences (user_id, theme, sms_notifications) \
             VALUES ($1, $2, $3) ON CONFLICT (user_id) DO UPDATE SET \
             theme = EXCLUDED.theme, sms_notifications = EXCLUDED.sms_notifications \
             RETURNING *"
        );
    }
}
