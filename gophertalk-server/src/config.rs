//! Process settings
//!
//! The CLI fills these from flags and environment variables; the server
//! only checks that the resulting values are usable.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

use crate::auth::token::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, MAX_TOKEN_TTL};
use crate::db::pool::PoolConfig;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Datastore connection parameters
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Takes precedence over the individual fields when set.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: None,
            name: "gophertalk".into(),
        }
    }
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = &self.url {
            return url.parse().map_err(|e: sqlx::Error| ConfigError::Invalid {
                var: "DATABASE_URL",
                value: redact_url(url),
                reason: e.to_string(),
            });
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &self.url.as_deref().map(redact_url))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("name", &self.name)
            .finish()
    }
}

/// Everything `serve` and `migrate` need
#[derive(Clone)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    pub database: DatabaseSettings,
    pub pool: PoolConfig,
    /// Required by `serve`, unused by `migrate`.
    pub jwt_secret: Option<String>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub cors_permissive: bool,
    pub run_migrations: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            database: DatabaseSettings::default(),
            pool: PoolConfig::default(),
            jwt_secret: None,
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            cors_permissive: false,
            run_migrations: false,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("pool", &self.pool)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "***"))
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("cors_permissive", &self.cors_permissive)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

impl Settings {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The signing secret, or an error naming the variable to set.
    pub fn require_jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .ok_or(ConfigError::Missing("JWT_SECRET"))
    }

    /// Reject values that parse but cannot be served with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_POOL_MAX",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        for (var, ttl) in [
            ("ACCESS_TOKEN_TTL_SECS", self.access_ttl),
            ("REFRESH_TOKEN_TTL_SECS", self.refresh_ttl),
        ] {
            if ttl.is_zero() || ttl > MAX_TOKEN_TTL {
                return Err(ConfigError::Invalid {
                    var,
                    value: ttl.as_secs().to_string(),
                    reason: format!("must be between 1 and {} seconds", MAX_TOKEN_TTL.as_secs()),
                });
            }
        }
        Ok(())
    }
}

/// Strip the password from a connection URL for logs and errors.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let userinfo = &url[scheme_end + 3..at];
            match userinfo.split_once(':') {
                Some((user, _)) => format!("{}{user}:***{}", &url[..scheme_end + 3], &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
