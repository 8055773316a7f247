//! Auth endpoints: register, login, refresh

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::{hash_password, reject_unknown_user, verify_password, AuthError, TokenPair};
use crate::db::{DbError, Manager, NewUser, UserStore};
use crate::http::error::ApiError;
use crate::http::extractors::ValidJson;
use crate::http::registry::Module;
use crate::models::{Password, PersonName, UserName, ValidationError};
use crate::state::AppState;

pub const PREFIX: &str = "/api/auth";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_name: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/auth/register
async fn register<M>(
    State(state): State<AppState<M>>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenPair>), ApiError>
where
    M: Manager,
    M::Type: UserStore,
{
    let user_name = UserName::new(&req.user_name)?;
    let password = Password::confirmed(&req.password, &req.password_confirm)?;
    let first_name = PersonName::optional("first_name", req.first_name.as_deref())?;
    let last_name = PersonName::optional("last_name", req.last_name.as_deref())?;

    let new = NewUser {
        user_name: user_name.into_string(),
        password_hash: hash_password(password.expose().to_owned()).await?,
        first_name: first_name.map(PersonName::into_string),
        last_name: last_name.map(PersonName::into_string),
    };

    let user = state
        .pool()
        .run(move |c| c.create_user(new))
        .await
        .map_err(|e| match e {
            DbError::UniqueViolation { .. } => ApiError::Conflict {
                message: "user name is already taken".into(),
            },
            other => other.into(),
        })?;

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(state.tokens().issue(user.id)?)))
}

/// POST /api/auth/login
async fn login<M>(
    State(state): State<AppState<M>>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError>
where
    M: Manager,
    M::Type: UserStore,
{
    if req.user_name.is_empty() {
        return Err(ValidationError::Empty { field: "user_name" }.into());
    }
    if req.password.is_empty() {
        return Err(ValidationError::Empty { field: "password" }.into());
    }

    let user_name = req.user_name;
    let credentials = match state
        .pool()
        .run(move |c| c.find_credentials(user_name))
        .await
    {
        Ok(credentials) => credentials,
        Err(DbError::NotFound { .. }) => {
            return Err(reject_unknown_user(req.password).await.into());
        }
        Err(other) => return Err(other.into()),
    };

    verify_password(req.password, credentials.password_hash).await?;
    Ok(Json(state.tokens().issue(credentials.id)?))
}

/// POST /api/auth/refresh
///
/// The subject must still exist; a deleted account cannot refresh.
async fn refresh<M>(
    State(state): State<AppState<M>>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError>
where
    M: Manager,
    M::Type: UserStore,
{
    let user_id = state.tokens().verify_refresh(&req.refresh_token)?;

    state
        .pool()
        .run(move |c| c.find_user(user_id))
        .await
        .map_err(|e| match e {
            DbError::NotFound { .. } => AuthError::InvalidToken.into(),
            other => ApiError::from(other),
        })?;

    Ok(Json(state.tokens().issue(user_id)?))
}

pub fn module<M>() -> Module<AppState<M>>
where
    M: Manager,
    M::Type: UserStore,
{
    let router = Router::new()
        .route("/register", post(register::<M>))
        .route("/login", post(login::<M>))
        .route("/refresh", post(refresh::<M>));
    Module::new("auth", PREFIX, router)
}
