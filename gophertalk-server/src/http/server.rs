//! Composition root and listener lifecycle
//!
//! `uninitialized → routes-bound → listening → draining → stopped`
//!
//! Each step consumes the previous typestate, so routes cannot be changed
//! once bound and a listener cannot exist before the prefix table is valid.
//! The current [`Phase`] is also published on a watch channel.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use super::middleware;
use super::registry::{Module, RouteError, RouteTable};
use crate::db::Manager;
use crate::state::AppState;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:3000). Port 0 picks a free port.
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            cors_permissive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Uninitialized,
    RoutesBound,
    Listening,
    Draining,
    Stopped,
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uninitialized: state and config, no routes yet.
pub struct App<M: Manager> {
    state: AppState<M>,
    config: ServerConfig,
    phase: Arc<watch::Sender<Phase>>,
}

impl<M: Manager> App<M> {
    pub fn new(state: AppState<M>, config: ServerConfig) -> Self {
        let (phase, _) = watch::channel(Phase::Uninitialized);
        Self {
            state,
            config,
            phase: Arc::new(phase),
        }
    }

    /// Observe lifecycle transitions.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Validate the prefix table and assemble the router with global middleware.
    ///
    /// Overlapping or malformed prefixes are fatal here, before any listener exists.
    pub fn bind_routes(self, modules: Vec<Module<AppState<M>>>) -> Result<BoundApp<M>, ServerError> {
        let table = RouteTable::new(modules)?;
        let routes = table.entries();
        for (prefix, module) in &routes {
            tracing::info!(module, prefix, "module registered");
        }

        let router = table
            .into_router()
            .fallback(middleware::not_found)
            .layer(axum::middleware::from_fn(middleware::reject_malformed_json))
            .layer(CatchPanicLayer::custom(middleware::panic_response))
            .layer(middleware::cors(self.config.cors_permissive))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone());

        self.phase.send_replace(Phase::RoutesBound);
        Ok(BoundApp {
            state: self.state,
            config: self.config,
            phase: self.phase,
            router,
            routes,
        })
    }
}

/// Routes bound, no listener yet.
pub struct BoundApp<M: Manager> {
    state: AppState<M>,
    config: ServerConfig,
    phase: Arc<watch::Sender<Phase>>,
    router: Router,
    routes: Vec<(&'static str, &'static str)>,
}

impl<M: Manager> BoundApp<M> {
    /// The assembled router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// `(prefix, module name)` in registration order.
    pub fn routes(&self) -> &[(&'static str, &'static str)] {
        &self.routes
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Bind the TCP listener.
    pub async fn listen(self) -> Result<ListeningApp<M>, ServerError> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        tracing::info!(%local_addr, "server listening");
        self.phase.send_replace(Phase::Listening);
        Ok(ListeningApp {
            state: self.state,
            phase: self.phase,
            router: self.router,
            listener,
            local_addr,
        })
    }
}

/// Listener bound, ready to serve.
pub struct ListeningApp<M: Manager> {
    state: AppState<M>,
    phase: Arc<watch::Sender<Phase>>,
    router: Router,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl<M: Manager> ListeningApp<M> {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Serve until `shutdown` resolves, then drain and stop.
    ///
    /// Draining stops accepting connections and lets in-flight requests
    /// finish. The pool is closed only after that, once every outstanding
    /// connection has been released.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let phase = Arc::clone(&self.phase);
        let signal = async move {
            shutdown.await;
            tracing::info!("shutdown requested, draining in-flight requests");
            phase.send_replace(Phase::Draining);
        };

        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await;

        self.state.pool().close().await;
        self.phase.send_replace(Phase::Stopped);
        served?;

        tracing::info!("server shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed the failure is logged and that source
/// never fires; the other one still can.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(!config.cors_permissive);
    }

    #[test]
    fn phase_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Phase::RoutesBound).unwrap(),
            "\"routes-bound\""
        );
    }
}
