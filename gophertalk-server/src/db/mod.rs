//! Database layer - connection pool, backends and stores
//!
//! # Design Principles
//!
//! - One bounded pool per process, shared by every module - no Arc<Mutex<Connection>>
//! - Handlers never hold a connection across a response; `Pool::run` scopes it
//! - All list operations use JOINs - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
pub mod repos;

pub use error::DbError;
pub use memory::{MemoryConnection, MemoryManager, MemoryStore};
pub use pool::{Manager, Pool, PoolConfig, PoolStatus, PooledConnection};
pub use postgres::{PgManager, PgPool};
pub use repos::*;
