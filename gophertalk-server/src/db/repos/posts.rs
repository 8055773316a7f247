//! Post store
//!
//! Handles feed reads and post interactions:
//! - list: counts via LEFT JOINs on grouped likes/views/replies (no N+1)
//! - delete: soft delete, restricted to the author
//! - view/like: CTE insert with ON CONFLICT, existence reported in the same query

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, Row};

use crate::db::DbError;
use crate::models::Page;

/// Post with interaction counts, as seen by one viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub user_id: i64,
    pub reply_to_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
    pub views_count: i64,
    pub replies_count: i64,
    pub user_liked: bool,
    pub user_viewed: bool,
}

/// Insert payload
#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub user_id: i64,
    pub reply_to_id: Option<i64>,
}

/// Feed query
#[derive(Debug, Clone)]
pub struct PostFilter {
    /// Whose like/view flags to report
    pub viewer_id: i64,
    /// Case-insensitive substring of the text
    pub search: Option<String>,
    /// Only posts by this author
    pub owner_id: Option<i64>,
    /// Replies to this post; top-level posts when `None`
    pub reply_to_id: Option<i64>,
    pub page: Page,
}

/// Post data operations, one logical operation per call
#[async_trait]
pub trait PostStore: Send {
    async fn list_posts(&mut self, filter: PostFilter) -> Result<Vec<Post>, DbError>;

    /// Fails with `ForeignKeyViolation` when `reply_to_id` names no post.
    async fn create_post(&mut self, new: NewPost) -> Result<Post, DbError> {
        let parent = new.reply_to_id;
        // A reply needs a live parent; soft-deleted posts count as missing.
        let post = sqlx::query_as::<_, Post>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (text, user_id, reply_to_id)
                SELECT $1, $2, $3
                WHERE $3::BIGINT IS NULL
                   OR EXISTS (SELECT 1 FROM posts WHERE id = $3 AND NOT deleted)
                RETURNING id, text, user_id, reply_to_id, created_at
            )
            SELECT
                id, text, user_id, reply_to_id, created_at,
                0::BIGINT AS likes_count,
                0::BIGINT AS views_count,
                0::BIGINT AS replies_count,
                FALSE AS user_liked,
                FALSE AS user_viewed
            FROM inserted
            "#,
        )
        .bind(new.text)
        .bind(new.user_id)
        .bind(parent)
        .fetch_optional(&mut *self)
        .await?;

        match (post, parent) {
            (Some(post), _) => Ok(post),
            (None, Some(parent)) => Err(DbError::not_found("post", parent)),
            (None, None) => Err(DbError::Query("post insert returned no row".into())),
        }
    }

    async fn delete_post(&mut self, id: i64, owner_id: i64) -> Result<(), DbError>;

    /// Idempotent.
    async fn view_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError>;

    /// Fails with `UniqueViolation` when already liked.
    async fn like_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError>;

    async fn unlike_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError>;
}

#[async_trait]
impl PostStore for PgConnection {
    async fn list_posts(&mut self, filter: PostFilter) -> Result<Vec<Post>, DbError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT
                p.id,
                p.text,
                p.user_id,
                p.reply_to_id,
                p.created_at,
                COALESCE(lc.n, 0) AS likes_count,
                COALESCE(vc.n, 0) AS views_count,
                COALESCE(rc.n, 0) AS replies_count,
                (ul.post_id IS NOT NULL) AS user_liked,
                (uv.post_id IS NOT NULL) AS user_viewed
            FROM posts p
            LEFT JOIN (SELECT post_id, COUNT(*) AS n FROM likes GROUP BY post_id) lc
                ON lc.post_id = p.id
            LEFT JOIN (SELECT post_id, COUNT(*) AS n FROM views GROUP BY post_id) vc
                ON vc.post_id = p.id
            LEFT JOIN (
                SELECT reply_to_id, COUNT(*) AS n FROM posts
                WHERE reply_to_id IS NOT NULL AND NOT deleted
                GROUP BY reply_to_id
            ) rc ON rc.reply_to_id = p.id
            LEFT JOIN likes ul ON ul.post_id = p.id AND ul.user_id = $1
            LEFT JOIN views uv ON uv.post_id = p.id AND uv.user_id = $1
            WHERE NOT p.deleted
              AND ($2::BIGINT IS NULL OR p.user_id = $2)
              AND (($3::BIGINT IS NULL AND p.reply_to_id IS NULL) OR p.reply_to_id = $3)
              AND ($4::TEXT IS NULL OR strpos(lower(p.text), lower($4)) > 0)
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.viewer_id)
        .bind(filter.owner_id)
        .bind(filter.reply_to_id)
        .bind(filter.search)
        .bind(filter.page.limit as i64)
        .bind(filter.page.offset as i64)
        .fetch_all(&mut *self)
        .await?;

        Ok(posts)
    }

    async fn create_post(&mut self, new: NewPost) -> Result<Post, DbError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (text, user_id, reply_to_id) VALUES ($1, $2, $3)
                RETURNING id, text, user_id, reply_to_id, created_at
            )
            SELECT
                id, text, user_id, reply_to_id, created_at,
                0::BIGINT AS likes_count,
                0::BIGINT AS views_count,
                0::BIGINT AS replies_count,
                FALSE AS user_liked,
                FALSE AS user_viewed
            FROM inserted
            "#,
        )
        .bind(new.text)
        .bind(new.user_id)
        .bind(new.reply_to_id)
        .fetch_one(&mut *self)
        .await?;

        Ok(post)
    }

    async fn delete_post(&mut self, id: i64, owner_id: i64) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE posts SET deleted = TRUE WHERE id = $1 AND user_id = $2 AND NOT deleted",
        )
        .bind(id)
        .bind(owner_id)
        .execute(&mut *self)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("post", id));
        }
        Ok(())
    }

    async fn view_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError> {
        let row = sqlx::query(
            r#"
            WITH target AS (SELECT id FROM posts WHERE id = $1 AND NOT deleted),
            inserted AS (
                INSERT INTO views (post_id, user_id)
                SELECT id, $2 FROM target
                ON CONFLICT DO NOTHING
                RETURNING post_id
            )
            SELECT EXISTS (SELECT 1 FROM target) AS found
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *self)
        .await?;

        if !row.get::<bool, _>("found") {
            return Err(DbError::not_found("post", id));
        }
        Ok(())
    }

    async fn like_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError> {
        let row = sqlx::query(
            r#"
            WITH target AS (SELECT id FROM posts WHERE id = $1 AND NOT deleted),
            inserted AS (
                INSERT INTO likes (post_id, user_id)
                SELECT id, $2 FROM target
                ON CONFLICT DO NOTHING
                RETURNING post_id
            )
            SELECT
                EXISTS (SELECT 1 FROM target) AS found,
                EXISTS (SELECT 1 FROM inserted) AS inserted
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *self)
        .await?;

        if !row.get::<bool, _>("found") {
            return Err(DbError::not_found("post", id));
        }
        if !row.get::<bool, _>("inserted") {
            return Err(DbError::UniqueViolation {
                constraint: "likes_pkey".into(),
            });
        }
        Ok(())
    }

    async fn unlike_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("like", id));
        }
        Ok(())
    }
}
