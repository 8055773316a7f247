//! gophertalk-server: HTTP API for GopherTalk
//!
//! Auth, posts and users capability modules mounted behind one entry point,
//! all sharing one bounded connection pool, plus a datastore health check.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod state;

use std::future::Future;

pub use config::Settings;
pub use error::{Error, Result};
pub use state::AppState;

use auth::TokenService;
use db::{PgManager, PgPool, Pool};
use http::{api_modules, App, ServerConfig};

fn pg_pool(settings: &Settings) -> Result<PgPool> {
    let options = settings.database.connect_options()?;
    Ok(Pool::new(PgManager::new(options), settings.pool.clone())?)
}

/// Start the HTTP server and run until Ctrl+C or SIGTERM.
pub async fn serve(settings: Settings) -> Result<()> {
    serve_until(settings, http::shutdown_signal()).await
}

/// Start the HTTP server and run until `shutdown` resolves.
///
/// An unreachable datastore at startup is logged, not fatal: the server
/// comes up and the health check reports the failure.
pub async fn serve_until<F>(settings: Settings, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    settings.validate()?;
    let secret = settings.require_jwt_secret()?;
    let tokens = TokenService::with_ttl(secret.as_bytes(), settings.access_ttl, settings.refresh_ttl);
    let pool = pg_pool(&settings)?;

    if settings.run_migrations {
        db::migrations::run(&pool).await?;
    } else if let Err(e) = pool.health_check().await {
        tracing::warn!(error = %e, "datastore unreachable at startup");
    }

    let config = ServerConfig {
        bind_addr: settings.addr(),
        cors_permissive: settings.cors_permissive,
    };
    let app = App::new(AppState::new(pool, tokens), config)
        .bind_routes(api_modules())?
        .listen()
        .await?;
    app.run(shutdown).await?;
    Ok(())
}

/// Create the schema and exit.
pub async fn migrate(settings: Settings) -> Result<()> {
    settings.validate()?;
    let pool = pg_pool(&settings)?;
    let result = db::migrations::run(&pool).await;
    pool.close().await;
    Ok(result?)
}
