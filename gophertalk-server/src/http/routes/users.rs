//! User endpoints: list, get, update self, delete self

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::hash_password;
use crate::db::{DbError, Manager, User, UserChanges, UserStore};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidId, ValidJson, ValidQuery};
use crate::http::registry::Module;
use crate::models::{Page, PageParams, Password, PersonName, UserName, ValidationError};
use crate::state::AppState;

pub const PREFIX: &str = "/api/users";

/// Public profile; the password hash never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub user_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: i16,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            user_name: u.user_name,
            first_name: u.first_name,
            last_name: u.last_name,
            status: u.status,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

fn ensure_self(caller: i64, id: i64) -> Result<(), ApiError> {
    if caller != id {
        return Err(ApiError::forbidden("can only modify your own profile"));
    }
    Ok(())
}

/// A password change needs both fields, and they must agree.
fn password_change(req: &UpdateUserRequest) -> Result<Option<Password>, ValidationError> {
    match (req.password.as_deref(), req.password_confirm.as_deref()) {
        (None, None) => Ok(None),
        (Some(pw), confirm) => Password::confirmed(pw, confirm.unwrap_or_default()).map(Some),
        (None, Some(_)) => Err(ValidationError::Mismatch {
            field: "password_confirm",
            other: "password",
        }),
    }
}

/// GET /api/users
async fn list_users<M>(
    State(state): State<AppState<M>>,
    AuthUser(_caller): AuthUser,
    ValidQuery(params): ValidQuery<PageParams>,
) -> Result<Json<Vec<UserResponse>>, ApiError>
where
    M: Manager,
    M::Type: UserStore,
{
    let page = Page::try_from(params)?;
    let users = state.pool().run(move |c| c.list_users(page)).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /api/users/{id}
async fn get_user<M>(
    State(state): State<AppState<M>>,
    AuthUser(_caller): AuthUser,
    ValidId(id): ValidId,
) -> Result<Json<UserResponse>, ApiError>
where
    M: Manager,
    M::Type: UserStore,
{
    let user = state.pool().run(move |c| c.find_user(id)).await?;
    Ok(Json(user.into()))
}

/// PATCH /api/users/{id}
async fn update_user<M>(
    State(state): State<AppState<M>>,
    AuthUser(caller): AuthUser,
    ValidId(id): ValidId,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError>
where
    M: Manager,
    M::Type: UserStore,
{
    ensure_self(caller, id)?;

    let password = password_change(&req)?;

    let mut changes = UserChanges {
        user_name: req
            .user_name
            .as_deref()
            .map(UserName::new)
            .transpose()?
            .map(UserName::into_string),
        password_hash: None,
        first_name: PersonName::optional("first_name", req.first_name.as_deref())?
            .map(PersonName::into_string),
        last_name: PersonName::optional("last_name", req.last_name.as_deref())?
            .map(PersonName::into_string),
    };
    if let Some(password) = password {
        changes.password_hash = Some(hash_password(password.expose().to_owned()).await?);
    }
    if changes.is_empty() {
        return Err(ValidationError::Empty { field: "update" }.into());
    }

    let user = state
        .pool()
        .run(move |c| c.update_user(id, changes))
        .await
        .map_err(|e| match e {
            DbError::UniqueViolation { .. } => ApiError::Conflict {
                message: "user name is already taken".into(),
            },
            other => other.into(),
        })?;

    Ok(Json(user.into()))
}

/// DELETE /api/users/{id}
async fn delete_user<M>(
    State(state): State<AppState<M>>,
    AuthUser(caller): AuthUser,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError>
where
    M: Manager,
    M::Type: UserStore,
{
    ensure_self(caller, id)?;
    state.pool().run(move |c| c.delete_user(id)).await?;
    tracing::info!(user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn module<M>() -> Module<AppState<M>>
where
    M: Manager,
    M::Type: UserStore,
{
    let router = Router::new()
        .route("/", get(list_users::<M>))
        .route(
            "/{id}",
            get(get_user::<M>)
                .patch(update_user::<M>)
                .delete(delete_user::<M>),
        );
    Module::new("users", PREFIX, router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn response_omits_internal_fields() {
        let user = User {
            id: 1,
            user_name: "gopher".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            status: 0,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["user_name"], "gopher");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn only_self_may_modify() {
        assert!(ensure_self(4, 4).is_ok());
        assert!(matches!(ensure_self(4, 5), Err(ApiError::Forbidden { .. })));
    }

    #[test]
    fn password_change_needs_both_fields() {
        let none = UpdateUserRequest::default();
        assert!(password_change(&none).unwrap().is_none());

        let confirm_only = UpdateUserRequest {
            password_confirm: Some("Secret42$".into()),
            ..Default::default()
        };
        assert!(matches!(
            password_change(&confirm_only),
            Err(ValidationError::Mismatch { field: "password_confirm", .. })
        ));

        let password_only = UpdateUserRequest {
            password: Some("Secret42$".into()),
            ..Default::default()
        };
        assert!(password_change(&password_only).is_err());

        let both = UpdateUserRequest {
            password: Some("Secret42$".into()),
            password_confirm: Some("Secret42$".into()),
            ..Default::default()
        };
        assert!(password_change(&both).unwrap().is_some());
    }
}
