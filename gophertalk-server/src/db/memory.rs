//! In-process datastore behind the same pool and store traits as Postgres
//!
//! Keeps the same constraint semantics as the SQL schema (unique user names,
//! foreign keys, one like/view per user and post, cascading deletes) so the
//! HTTP surface behaves identically. Reachability and per-operation latency
//! can be switched at runtime to exercise the pool and the health reporter.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool::managed::{self, Metrics, RecycleResult};

use super::error::DbError;
use super::pool::Manager;
use super::repos::{
    Credentials, NewPost, NewUser, Post, PostFilter, PostStore, User, UserChanges, UserStore,
};
use crate::models::Page;

/// Shared handle to the in-memory tables. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: Mutex<Tables>,
    reachable: AtomicBool,
    latency_ms: AtomicU64,
    open_connections: AtomicUsize,
    operations: AtomicU64,
}

impl Default for MemoryInner {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            reachable: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            open_connections: AtomicUsize::new(0),
            operations: AtomicU64::new(0),
        }
    }
}

impl MemoryInner {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(&self) -> Result<(), DbError> {
        if self.reachable.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DbError::Connectivity("memory store unreachable".into()))
        }
    }
}

#[derive(Default)]
struct Tables {
    last_user_id: i64,
    last_post_id: i64,
    users: BTreeMap<i64, UserRow>,
    posts: BTreeMap<i64, PostRow>,
    likes: BTreeSet<(i64, i64)>,
    views: BTreeSet<(i64, i64)>,
}

struct UserRow {
    user: User,
    password_hash: String,
}

struct PostRow {
    id: i64,
    text: String,
    user_id: i64,
    reply_to_id: Option<i64>,
    created_at: DateTime<Utc>,
    deleted: bool,
}

impl Tables {
    fn name_taken(&self, user_name: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|row| row.user.user_name == user_name && Some(row.user.id) != except)
    }

    fn live_post(&self, id: i64) -> Option<&PostRow> {
        self.posts.get(&id).filter(|p| !p.deleted)
    }

    fn render(&self, row: &PostRow, viewer_id: i64) -> Post {
        let count = |set: &BTreeSet<(i64, i64)>| {
            set.range((row.id, i64::MIN)..=(row.id, i64::MAX)).count() as i64
        };
        Post {
            id: row.id,
            text: row.text.clone(),
            user_id: row.user_id,
            reply_to_id: row.reply_to_id,
            created_at: row.created_at,
            likes_count: count(&self.likes),
            views_count: count(&self.views),
            replies_count: self
                .posts
                .values()
                .filter(|p| !p.deleted && p.reply_to_id == Some(row.id))
                .count() as i64,
            user_liked: self.likes.contains(&(row.id, viewer_id)),
            user_viewed: self.views.contains(&(row.id, viewer_id)),
        }
    }

    /// Remove posts and everything hanging off them, replies included.
    fn cascade_posts(&mut self, mut doomed: Vec<i64>) {
        while let Some(id) = doomed.pop() {
            if self.posts.remove(&id).is_none() {
                continue;
            }
            self.likes.retain(|(post_id, _)| *post_id != id);
            self.views.retain(|(post_id, _)| *post_id != id);
            doomed.extend(
                self.posts
                    .values()
                    .filter(|p| p.reply_to_id == Some(id))
                    .map(|p| p.id),
            );
        }
    }
}

fn window<T>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool adapter opening connections onto this store.
    pub fn manager(&self) -> MemoryManager {
        MemoryManager {
            store: self.clone(),
        }
    }

    /// Simulate the datastore going away or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::Release);
    }

    /// Delay added to every data operation.
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::Release);
    }

    /// Connections opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.inner.open_connections.load(Ordering::Acquire)
    }

    /// Data operations started so far, pings excluded.
    pub fn operations(&self) -> u64 {
        self.inner.operations.load(Ordering::Acquire)
    }
}

/// Pool [`Manager`] for [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryManager {
    store: MemoryStore,
}

impl managed::Manager for MemoryManager {
    type Type = MemoryConnection;
    type Error = DbError;

    async fn create(&self) -> Result<MemoryConnection, DbError> {
        let inner = &self.store.inner;
        inner.check_reachable()?;
        inner.open_connections.fetch_add(1, Ordering::AcqRel);
        Ok(MemoryConnection {
            inner: Arc::clone(inner),
        })
    }

    async fn recycle(&self, conn: &mut MemoryConnection, _: &Metrics) -> RecycleResult<DbError> {
        Ok(conn.inner.check_reachable()?)
    }
}

#[async_trait]
impl Manager for MemoryManager {
    async fn ping(&self, conn: &mut MemoryConnection) -> Result<(), DbError> {
        conn.inner.check_reachable()
    }
}

/// One logical connection onto a [`MemoryStore`]
pub struct MemoryConnection {
    inner: Arc<MemoryInner>,
}

impl MemoryConnection {
    async fn begin(&self) -> Result<(), DbError> {
        self.inner.operations.fetch_add(1, Ordering::AcqRel);
        let latency = self.inner.latency_ms.load(Ordering::Acquire);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.inner.check_reachable()
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.inner.open_connections.fetch_sub(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl UserStore for MemoryConnection {
    async fn create_user(&mut self, new: NewUser) -> Result<User, DbError> {
        self.begin().await?;
        let mut tables = self.inner.tables();

        if tables.name_taken(&new.user_name, None) {
            return Err(DbError::UniqueViolation {
                constraint: "users_user_name_key".into(),
            });
        }

        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            user_name: new.user_name,
            first_name: new.first_name,
            last_name: new.last_name,
            status: 0,
            created_at: Utc::now(),
        };
        tables.users.insert(
            user.id,
            UserRow {
                user: user.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(user)
    }

    async fn find_user(&mut self, id: i64) -> Result<User, DbError> {
        self.begin().await?;
        let tables = self.inner.tables();
        tables
            .users
            .get(&id)
            .map(|row| row.user.clone())
            .ok_or_else(|| DbError::not_found("user", id))
    }

    async fn find_credentials(&mut self, user_name: String) -> Result<Credentials, DbError> {
        self.begin().await?;
        let tables = self.inner.tables();
        let found = tables
            .users
            .values()
            .find(|row| row.user.user_name == user_name)
            .map(|row| Credentials {
                id: row.user.id,
                password_hash: row.password_hash.clone(),
            });
        found.ok_or_else(|| DbError::not_found("user", user_name))
    }

    async fn list_users(&mut self, page: Page) -> Result<Vec<User>, DbError> {
        self.begin().await?;
        let tables = self.inner.tables();
        Ok(window(tables.users.values().map(|row| row.user.clone()), page))
    }

    async fn update_user(&mut self, id: i64, changes: UserChanges) -> Result<User, DbError> {
        self.begin().await?;
        let mut tables = self.inner.tables();

        if let Some(name) = &changes.user_name {
            if tables.name_taken(name, Some(id)) {
                return Err(DbError::UniqueViolation {
                    constraint: "users_user_name_key".into(),
                });
            }
        }

        let row = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("user", id))?;
        if let Some(name) = changes.user_name {
            row.user.user_name = name;
        }
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        if let Some(first) = changes.first_name {
            row.user.first_name = Some(first);
        }
        if let Some(last) = changes.last_name {
            row.user.last_name = Some(last);
        }
        Ok(row.user.clone())
    }

    async fn delete_user(&mut self, id: i64) -> Result<(), DbError> {
        self.begin().await?;
        let mut tables = self.inner.tables();

        if tables.users.remove(&id).is_none() {
            return Err(DbError::not_found("user", id));
        }
        tables.likes.retain(|(_, user_id)| *user_id != id);
        tables.views.retain(|(_, user_id)| *user_id != id);
        let authored = tables
            .posts
            .values()
            .filter(|p| p.user_id == id)
            .map(|p| p.id)
            .collect();
        tables.cascade_posts(authored);
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryConnection {
    async fn list_posts(&mut self, filter: PostFilter) -> Result<Vec<Post>, DbError> {
        self.begin().await?;
        let tables = self.inner.tables();

        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut matching: Vec<&PostRow> = tables
            .posts
            .values()
            .filter(|p| !p.deleted)
            .filter(|p| filter.owner_id.map_or(true, |owner| p.user_id == owner))
            .filter(|p| p.reply_to_id == filter.reply_to_id)
            .filter(|p| {
                needle
                    .as_deref()
                    .map_or(true, |n| p.text.to_lowercase().contains(n))
            })
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(window(
            matching.into_iter().map(|p| tables.render(p, filter.viewer_id)),
            filter.page,
        ))
    }

    async fn create_post(&mut self, new: NewPost) -> Result<Post, DbError> {
        self.begin().await?;
        let mut tables = self.inner.tables();

        if !tables.users.contains_key(&new.user_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: "posts_user_id_fkey".into(),
            });
        }
        if let Some(parent) = new.reply_to_id {
            if tables.live_post(parent).is_none() {
                return Err(DbError::not_found("post", parent));
            }
        }

        tables.last_post_id += 1;
        let row = PostRow {
            id: tables.last_post_id,
            text: new.text,
            user_id: new.user_id,
            reply_to_id: new.reply_to_id,
            created_at: Utc::now(),
            deleted: false,
        };
        let post = Post {
            id: row.id,
            text: row.text.clone(),
            user_id: row.user_id,
            reply_to_id: row.reply_to_id,
            created_at: row.created_at,
            likes_count: 0,
            views_count: 0,
            replies_count: 0,
            user_liked: false,
            user_viewed: false,
        };
        tables.posts.insert(row.id, row);
        Ok(post)
    }

    async fn delete_post(&mut self, id: i64, owner_id: i64) -> Result<(), DbError> {
        self.begin().await?;
        let mut tables = self.inner.tables();

        match tables.posts.get_mut(&id) {
            Some(post) if !post.deleted && post.user_id == owner_id => {
                post.deleted = true;
                Ok(())
            }
            _ => Err(DbError::not_found("post", id)),
        }
    }

    async fn view_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError> {
        self.begin().await?;
        let mut tables = self.inner.tables();

        if tables.live_post(id).is_none() {
            return Err(DbError::not_found("post", id));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: "views_user_id_fkey".into(),
            });
        }
        tables.views.insert((id, user_id));
        Ok(())
    }

    async fn like_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError> {
        self.begin().await?;
        let mut tables = self.inner.tables();

        if tables.live_post(id).is_none() {
            return Err(DbError::not_found("post", id));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: "likes_user_id_fkey".into(),
            });
        }
        if !tables.likes.insert((id, user_id)) {
            return Err(DbError::UniqueViolation {
                constraint: "likes_pkey".into(),
            });
        }
        Ok(())
    }

    async fn unlike_post(&mut self, id: i64, user_id: i64) -> Result<(), DbError> {
        self.begin().await?;
        let mut tables = self.inner.tables();

        if !tables.likes.remove(&(id, user_id)) {
            return Err(DbError::not_found("like", id));
        }
        Ok(())
    }
}
