//! Store traits and their Postgres implementations
//!
//! Each store method is one logical data operation run on a single pooled
//! connection:
//! - Uses JOINs for list operations (no N+1)
//! - Handles conflicts via constraints (no check-then-insert)
//! - Missing rows surface as `DbError::NotFound`

pub mod posts;
pub mod users;

pub use posts::{NewPost, Post, PostFilter, PostStore};
pub use users::{Credentials, NewUser, User, UserChanges, UserStore};
