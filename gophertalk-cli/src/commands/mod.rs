//! Command implementations for the gophertalk CLI
//!
//! Every flag can also come from the environment variable named in its help;
//! a flag on the command line wins.

use std::time::Duration;

use clap::Args;
use gophertalk_server::config::DatabaseSettings;
use gophertalk_server::db::pool::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS};
use gophertalk_server::db::PoolConfig;

pub mod migrate;
pub mod serve;

pub use migrate::{run_migrate, MigrateArgs};
pub use serve::{run_serve, ServeArgs};

/// Datastore flags shared by every command
#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// PostgreSQL connection URL; takes precedence over the --db-* parts
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long, env = "DB_NAME", default_value = "gophertalk")]
    pub db_name: String,

    /// Maximum pooled connections
    #[arg(
        long,
        env = "DB_POOL_MAX",
        default_value_t = DEFAULT_MAX_CONNECTIONS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub pool_max: u32,

    /// Seconds to wait for a free connection
    #[arg(
        long,
        env = "DB_ACQUIRE_TIMEOUT_SECS",
        value_name = "SECS",
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT.as_secs()
    )]
    pub acquire_timeout: u64,
}

impl DatabaseArgs {
    fn into_settings(self) -> (DatabaseSettings, PoolConfig) {
        let database = DatabaseSettings {
            url: self.database_url,
            host: self.db_host,
            port: self.db_port,
            user: self.db_user,
            password: self.db_password,
            name: self.db_name,
        };
        let pool = PoolConfig {
            max_connections: self.pool_max,
            acquire_timeout: Duration::from_secs(self.acquire_timeout),
        };
        (database, pool)
    }
}
