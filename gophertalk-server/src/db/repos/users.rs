//! User store
//!
//! - create: plain INSERT, the unique index on `user_name` reports duplicates
//! - update: COALESCE per column so absent fields keep their value
//! - delete: cascades to posts, likes and views through foreign keys

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use crate::db::DbError;
use crate::models::Page;

/// User record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub user_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}

/// Login lookup result
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub id: i64,
    pub password_hash: String,
}

/// Insert payload; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Partial update; `None` leaves a column unchanged
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub user_name: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.user_name.is_none()
            && self.password_hash.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }
}

/// User data operations, one logical operation per call
#[async_trait]
pub trait UserStore: Send {
    async fn create_user(&mut self, new: NewUser) -> Result<User, DbError>;

    async fn find_user(&mut self, id: i64) -> Result<User, DbError>;

    async fn find_credentials(&mut self, user_name: String) -> Result<Credentials, DbError>;

    async fn list_users(&mut self, page: Page) -> Result<Vec<User>, DbError>;

    async fn update_user(&mut self, id: i64, changes: UserChanges) -> Result<User, DbError>;

    async fn delete_user(&mut self, id: i64) -> Result<(), DbError>;
}

const USER_COLUMNS: &str = "id, user_name, first_name, last_name, status, created_at";

#[async_trait]
impl UserStore for PgConnection {
    async fn create_user(&mut self, new: NewUser) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (user_name, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(new.user_name)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .fetch_one(&mut *self)
        .await?;

        Ok(user)
    }

    async fn find_user(&mut self, id: i64) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    async fn find_credentials(&mut self, user_name: String) -> Result<Credentials, DbError> {
        let found = sqlx::query_as::<_, Credentials>(
            "SELECT id, password_hash FROM users WHERE user_name = $1",
        )
        .bind(&user_name)
        .fetch_optional(&mut *self)
        .await?;

        found.ok_or_else(|| DbError::not_found("user", user_name))
    }

    async fn list_users(&mut self, page: Page) -> Result<Vec<User>, DbError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&mut *self)
        .await?;

        Ok(users)
    }

    async fn update_user(&mut self, id: i64, changes: UserChanges) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                user_name = COALESCE($2, user_name), \
                password_hash = COALESCE($3, password_hash), \
                first_name = COALESCE($4, first_name), \
                last_name = COALESCE($5, last_name) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.user_name)
        .bind(changes.password_hash)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .fetch_optional(&mut *self)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    async fn delete_user(&mut self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }
}
