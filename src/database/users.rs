use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::Role;
use crate::database::manager::DatabaseError;
use crate::database::models::{NewUser, User};

const USER_COLUMNS: &str =
    "uid, email, display_name, role, disabled, created_at, updated_at, last_login_at";

/// Persistence for dashboard users and their roles
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create on first sign in, otherwise refresh profile fields and last login.
    /// The stored role of an existing user is never changed here.
    async fn upsert_login(&self, user: &NewUser) -> Result<User, DatabaseError>;

    async fn find(&self, uid: &str) -> Result<Option<User>, DatabaseError>;

    async fn list(&self) -> Result<Vec<User>, DatabaseError>;

    async fn set_role(&self, uid: &str, role: Role) -> Result<Option<User>, DatabaseError>;

    async fn set_disabled(&self, uid: &str, disabled: bool) -> Result<Option<User>, DatabaseError>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn upsert_login(&self, user: &NewUser) -> Result<User, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO users (uid, email, display_name, role, last_login_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (uid) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = COALESCE(EXCLUDED.display_name, users.display_name),
                last_login_at = now(),
                updated_at = now()
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, User>(&query)
            .bind(&user.uid)
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn find(&self, uid: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE uid = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, DatabaseError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let users = sqlx::query_as::<_, User>(&query).fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn set_role(&self, uid: &str, role: Role) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE uid = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(uid)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_disabled(&self, uid: &str, disabled: bool) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "UPDATE users SET disabled = $2, updated_at = now() WHERE uid = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(uid)
            .bind(disabled)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
