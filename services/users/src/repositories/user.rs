//! User repository for database operations

use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::models::{NewUser, User, UserFilter, UserListItem, UserSummary, UserUpdate};

const SUMMARY_SELECT: &str = r#"
    SELECT u.id, u.auth_user_id, u.email, u.role, u.is_active, u.created_at, u.updated_at,
           p.first_name, p.last_name, p.date_of_birth, p.gender, p.phone, p.bio,
           pr.theme, pr.language, pr.timezone
    FROM users u
    LEFT JOIN user_profiles p ON u.id = p.user_id
    LEFT JOIN user_preferences pr ON u.id = pr.user_id
"#;

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, new_user: &NewUser) -> sqlx::Result<User> {
        info!("Creating user for auth user {}", new_user.auth_user_id);

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (auth_user_id, email, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_user.auth_user_id)
        .bind(&new_user.email)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
    }

    /// Find a user by surrogate ID
    pub async fn find_by_id(&self, id: i32) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a user by the external auth user ID
    pub async fn find_by_auth_user_id(&self, auth_user_id: i32) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE auth_user_id = $1")
            .bind(auth_user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    /// User joined with its profile and preference highlights
    pub async fn find_summary_by_auth_user_id(
        &self,
        auth_user_id: i32,
    ) -> sqlx::Result<Option<UserSummary>> {
        let query = format!("{} WHERE u.auth_user_id = $1", SUMMARY_SELECT);
        sqlx::query_as::<_, UserSummary>(&query)
            .bind(auth_user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Write the fields present in `update`; absent fields are untouched
    pub async fn update(&self, id: i32, update: &UserUpdate) -> sqlx::Result<Option<User>> {
        if update.is_empty() {
            return self.find_by_id(id).await;
        }

        info!("Updating user {}: {:?}", id, update.field_names());

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        {
            let mut fields = qb.separated(", ");
            if let Some(email) = &update.email {
                fields.push("email = ").push_bind_unseparated(email.clone());
            }
            if let Some(role) = update.role {
                fields.push("role = ").push_bind_unseparated(role.as_str());
            }
            if let Some(is_active) = update.is_active {
                fields.push("is_active = ").push_bind_unseparated(is_active);
            }
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        qb.build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await
    }

    /// Soft delete: flip the active flag, keep every row
    pub async fn deactivate(&self, id: i32) -> sqlx::Result<Option<User>> {
        info!("Deactivating user {}", id);

        sqlx::query_as::<_, User>("UPDATE users SET is_active = false WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Active users matching the filter, newest first
    pub async fn list(&self, filter: &UserFilter) -> sqlx::Result<Vec<UserListItem>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT u.id, u.auth_user_id, u.email, u.role, u.is_active, u.created_at,
                   p.first_name, p.last_name
            FROM users u
            LEFT JOIN user_profiles p ON u.id = p.user_id
            "#,
        );
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY u.created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        qb.build_query_as::<UserListItem>()
            .fetch_all(&self.pool)
            .await
    }

    /// Number of active users matching the filter, ignoring pagination
    pub async fn count(&self, filter: &UserFilter) -> sqlx::Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM users u LEFT JOIN user_profiles p ON u.id = p.user_id",
        );
        push_filter(&mut qb, filter);

        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
    }

    /// Number of active users
    pub async fn count_active(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = true")
            .fetch_one(&self.pool)
            .await
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE u.is_active = true");

    if let Some(role) = filter.role {
        qb.push(" AND u.role = ").push_bind(role.as_str());
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.last_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Escape LIKE wildcards so the search is a plain substring match
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn search_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("ada"), "ada");
    }

    #[test]
    fn filter_only_adds_requested_conditions() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM users u");
        push_filter(&mut qb, &UserFilter::default());
        assert_eq!(qb.sql(), "SELECT 1 FROM users u WHERE u.is_active = true");

        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM users u");
        push_filter(
            &mut qb,
            &UserFilter {
                role: Some(Role::Psychiatrist),
                search: Some("ada".to_string()),
                limit: 10,
                offset: 0,
            },
        );
        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM users u WHERE u.is_active = true AND u.role = $1 \
             AND (u.email ILIKE $2 OR p.first_name ILIKE $3 OR p.last_name ILIKE $4)"
        );
    }
}
