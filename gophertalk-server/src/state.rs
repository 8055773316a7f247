//! Application state shared across handlers

use std::sync::Arc;

use crate::auth::TokenService;
use crate::db::{Manager, Pool};

/// Shared application state: the one pool and the identity verifier.
pub struct AppState<M: Manager> {
    inner: Arc<AppStateInner<M>>,
}

struct AppStateInner<M: Manager> {
    pool: Pool<M>,
    tokens: TokenService,
}

// Manual impl: derive would demand `M: Clone`.
impl<M: Manager> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Manager> AppState<M> {
    pub fn new(pool: Pool<M>, tokens: TokenService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { pool, tokens }),
        }
    }

    pub fn pool(&self) -> &Pool<M> {
        &self.inner.pool
    }

    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }
}
