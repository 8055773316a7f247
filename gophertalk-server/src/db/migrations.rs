//! Schema for users, posts, likes and views
//!
//! Idempotent: every statement is `IF NOT EXISTS`, and the whole set runs in
//! one transaction on a single pooled connection.

use sqlx::Connection;

use super::error::DbError;
use super::postgres::PgPool;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        user_name TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT,
        last_name TEXT,
        status SMALLINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id BIGSERIAL PRIMARY KEY,
        text TEXT NOT NULL,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        reply_to_id BIGINT REFERENCES posts(id) ON DELETE CASCADE,
        deleted BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS likes (
        post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (post_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS views (
        post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (post_id, user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_reply_to ON posts(reply_to_id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id)",
];

/// Create any missing tables and indexes.
pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!(statements = SCHEMA.len(), "running migrations");

    pool.run(|conn| {
        Box::pin(async move {
            let mut tx = conn.begin().await?;
            for statement in SCHEMA {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            tx.commit().await?;
            Ok::<_, DbError>(())
        })
    })
    .await?;

    tracing::info!("migrations complete");
    Ok(())
}
