//! Capability modules, one per URL prefix

pub mod auth;
pub mod health;
pub mod posts;
pub mod users;

use crate::db::{Manager, PostStore, UserStore};
use crate::http::registry::Module;
use crate::state::AppState;

/// The standard module set: auth, posts, users and the health reporter.
pub fn api_modules<M>() -> Vec<Module<AppState<M>>>
where
    M: Manager,
    M::Type: UserStore + PostStore,
{
    vec![
        auth::module::<M>(),
        posts::module::<M>(),
        users::module::<M>(),
        health::module::<M>(),
    ]
}
