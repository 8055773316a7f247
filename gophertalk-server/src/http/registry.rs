//! Static prefix table for capability modules
//!
//! Built once before the listener opens and immutable afterwards. Prefixes
//! must be disjoint at path-segment granularity: `/api/posts` collides with
//! `/api/posts` and `/api/posts/likes`, not with `/api/postsx`.

use axum::Router;

/// A capability module: one router mounted under one prefix.
pub struct Module<S> {
    name: &'static str,
    prefix: &'static str,
    router: Router<S>,
}

impl<S> Module<S> {
    pub fn new(name: &'static str, prefix: &'static str, router: Router<S>) -> Self {
        Self {
            name,
            prefix,
            router,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("module '{module}' prefix {prefix:?} is invalid: {reason}")]
    InvalidPrefix {
        module: &'static str,
        prefix: &'static str,
        reason: &'static str,
    },

    #[error("module '{module}' prefix {prefix:?} overlaps module '{other}' prefix {other_prefix:?}")]
    Overlap {
        module: &'static str,
        prefix: &'static str,
        other: &'static str,
        other_prefix: &'static str,
    },
}

/// Validated set of modules, ready to be mounted
pub struct RouteTable<S> {
    modules: Vec<Module<S>>,
}

impl<S> std::fmt::Debug for RouteTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.modules.iter().map(|m| (m.prefix, m.name)))
            .finish()
    }
}

impl<S> RouteTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Check every prefix and every pair of prefixes.
    pub fn new(modules: Vec<Module<S>>) -> Result<Self, RouteError> {
        for module in &modules {
            check_prefix(module)?;
        }

        for (i, a) in modules.iter().enumerate() {
            for b in &modules[i + 1..] {
                if overlaps(a.prefix, b.prefix) {
                    return Err(RouteError::Overlap {
                        module: b.name,
                        prefix: b.prefix,
                        other: a.name,
                        other_prefix: a.prefix,
                    });
                }
            }
        }

        Ok(Self { modules })
    }

    /// `(prefix, module name)` in registration order.
    pub fn entries(&self) -> Vec<(&'static str, &'static str)> {
        self.modules.iter().map(|m| (m.prefix, m.name)).collect()
    }

    /// Mount every module on one router.
    pub fn into_router(self) -> Router<S> {
        self.modules
            .into_iter()
            .fold(Router::new(), |router, module| {
                tracing::debug!(module = module.name, prefix = module.prefix, "mounting module");
                router.nest(module.prefix, module.router)
            })
    }
}

fn check_prefix<S>(module: &Module<S>) -> Result<(), RouteError> {
    let invalid = |reason| RouteError::InvalidPrefix {
        module: module.name,
        prefix: module.prefix,
        reason,
    };

    let prefix = module.prefix;
    if !prefix.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if prefix == "/" || prefix.ends_with('/') {
        return Err(invalid("must not be the root or end with '/'"));
    }
    if segments(prefix).any(str::is_empty) {
        return Err(invalid("must not contain empty segments"));
    }
    if prefix.contains(['{', '}', '*']) {
        return Err(invalid("must be static"));
    }
    Ok(())
}

fn segments(prefix: &str) -> impl Iterator<Item = &str> {
    prefix[1..].split('/')
}

/// One prefix is a segment-wise prefix of the other.
fn overlaps(a: &str, b: &str) -> bool {
    segments(a).zip(segments(b)).all(|(x, y)| x == y)
}
