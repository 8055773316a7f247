//! `gophertalk serve`

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use gophertalk_server::auth::token::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, MAX_TOKEN_TTL};
use gophertalk_server::config::DEFAULT_PORT;
use gophertalk_server::Settings;

use super::DatabaseArgs;

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, short = 'p', env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[command(flatten)]
    pub database: DatabaseArgs,

    /// HS256 signing secret for access and refresh tokens (required)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(
        long,
        env = "ACCESS_TOKEN_TTL_SECS",
        value_name = "SECS",
        default_value_t = DEFAULT_ACCESS_TTL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL.as_secs())
    )]
    pub access_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(
        long,
        env = "REFRESH_TOKEN_TTL_SECS",
        value_name = "SECS",
        default_value_t = DEFAULT_REFRESH_TTL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL.as_secs())
    )]
    pub refresh_ttl: u64,

    /// Allow any CORS origin instead of local dev origins only - use with caution
    #[arg(long, env = "CORS_PERMISSIVE", value_parser = BoolishValueParser::new())]
    pub cors_permissive: bool,

    /// Create the schema before serving
    #[arg(long = "migrate", env = "RUN_MIGRATIONS", value_parser = BoolishValueParser::new())]
    pub run_migrations: bool,
}

impl ServeArgs {
    fn into_settings(self) -> Settings {
        let (database, pool) = self.database.into_settings();
        Settings {
            host: self.host,
            port: self.port,
            database,
            pool,
            jwt_secret: self.jwt_secret,
            access_ttl: Duration::from_secs(self.access_ttl),
            refresh_ttl: Duration::from_secs(self.refresh_ttl),
            cors_permissive: self.cors_permissive,
            run_migrations: self.run_migrations,
        }
    }
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let settings = args.into_settings();

    tracing::info!(
        addr = %settings.addr(),
        pool_max = settings.pool.max_connections,
        "starting gophertalk server"
    );
    tracing::debug!(?settings, "resolved configuration");

    gophertalk_server::serve(settings)
        .await
        .context("server error")?;
    Ok(())
}
