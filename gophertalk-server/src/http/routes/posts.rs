//! Post endpoints: feed, create, delete, view, like, unlike
//!
//! Every endpoint requires an access token; the token subject is the actor.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::{Manager, NewPost, Post, PostFilter, PostStore};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidId, ValidJson, ValidQuery};
use crate::http::registry::Module;
use crate::models::{positive_id, Page, PageParams, PostText};
use crate::state::AppState;

pub const PREFIX: &str = "/api/posts";

/// Feed query string. Listed field by field: numbers don't survive
/// `#[serde(flatten)]` in query strings.
#[derive(Debug, Default, Deserialize)]
pub struct ListPostsQuery {
    pub search: Option<String>,
    pub owner_id: Option<i64>,
    pub user_id: Option<i64>,
    pub reply_to_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListPostsQuery {
    fn into_filter(self, caller: i64) -> Result<PostFilter, ApiError> {
        let page = Page::try_from(PageParams {
            limit: self.limit,
            offset: self.offset,
        })?;
        let search = self
            .search
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());

        Ok(PostFilter {
            viewer_id: self
                .user_id
                .map(|id| positive_id("user_id", id))
                .transpose()?
                .unwrap_or(caller),
            search,
            owner_id: self
                .owner_id
                .map(|id| positive_id("owner_id", id))
                .transpose()?,
            reply_to_id: self
                .reply_to_id
                .map(|id| positive_id("reply_to_id", id))
                .transpose()?,
            page,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub text: String,
    pub reply_to_id: Option<i64>,
}

/// GET /api/posts
async fn list_posts<M>(
    State(state): State<AppState<M>>,
    AuthUser(caller): AuthUser,
    ValidQuery(query): ValidQuery<ListPostsQuery>,
) -> Result<Json<Vec<Post>>, ApiError>
where
    M: Manager,
    M::Type: PostStore,
{
    let filter = query.into_filter(caller)?;
    let posts = state.pool().run(move |c| c.list_posts(filter)).await?;
    Ok(Json(posts))
}

/// POST /api/posts
async fn create_post<M>(
    State(state): State<AppState<M>>,
    AuthUser(caller): AuthUser,
    ValidJson(req): ValidJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError>
where
    M: Manager,
    M::Type: PostStore,
{
    let new = NewPost {
        text: PostText::new(&req.text)?.into_string(),
        user_id: caller,
        reply_to_id: req
            .reply_to_id
            .map(|id| positive_id("reply_to_id", id))
            .transpose()?,
    };

    let post = state.pool().run(move |c| c.create_post(new)).await?;
    tracing::debug!(post_id = post.id, user_id = caller, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// DELETE /api/posts/{id}
async fn delete_post<M>(
    State(state): State<AppState<M>>,
    AuthUser(caller): AuthUser,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError>
where
    M: Manager,
    M::Type: PostStore,
{
    state.pool().run(move |c| c.delete_post(id, caller)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/posts/{id}/view
async fn view_post<M>(
    State(state): State<AppState<M>>,
    AuthUser(caller): AuthUser,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError>
where
    M: Manager,
    M::Type: PostStore,
{
    state.pool().run(move |c| c.view_post(id, caller)).await?;
    Ok(StatusCode::CREATED)
}

/// POST /api/posts/{id}/like
async fn like_post<M>(
    State(state): State<AppState<M>>,
    AuthUser(caller): AuthUser,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError>
where
    M: Manager,
    M::Type: PostStore,
{
    state.pool().run(move |c| c.like_post(id, caller)).await?;
    Ok(StatusCode::CREATED)
}

/// DELETE /api/posts/{id}/like
async fn unlike_post<M>(
    State(state): State<AppState<M>>,
    AuthUser(caller): AuthUser,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError>
where
    M: Manager,
    M::Type: PostStore,
{
    state.pool().run(move |c| c.unlike_post(id, caller)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn module<M>() -> Module<AppState<M>>
where
    M: Manager,
    M::Type: PostStore,
{
    let router = Router::new()
        .route("/", get(list_posts::<M>).post(create_post::<M>))
        .route("/{id}", delete(delete_post::<M>))
        .route("/{id}/view", post(view_post::<M>))
        .route("/{id}/like", post(like_post::<M>).delete(unlike_post::<M>));
    Module::new("posts", PREFIX, router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationError;

    #[test]
    fn user_id_defaults_to_caller() {
        let filter = ListPostsQuery::default().into_filter(7).unwrap();
        assert_eq!(filter.viewer_id, 7);
        assert_eq!(filter.reply_to_id, None);
        assert_eq!(filter.page, Page::default());

        let filter = ListPostsQuery {
            user_id: Some(3),
            ..ListPostsQuery::default()
        }
        .into_filter(7)
        .unwrap();
        assert_eq!(filter.viewer_id, 3);
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = ListPostsQuery {
            search: Some("   ".into()),
            ..ListPostsQuery::default()
        }
        .into_filter(1)
        .unwrap();
        assert_eq!(filter.search, None);
    }

    #[test]
    fn rejects_non_positive_ids_and_bad_pages() {
        let bad = [
            ListPostsQuery {
                owner_id: Some(0),
                ..ListPostsQuery::default()
            },
            ListPostsQuery {
                reply_to_id: Some(-1),
                ..ListPostsQuery::default()
            },
            ListPostsQuery {
                limit: Some(0),
                ..ListPostsQuery::default()
            },
            ListPostsQuery {
                offset: Some(-5),
                ..ListPostsQuery::default()
            },
        ];
        for query in bad {
            assert!(matches!(
                query.into_filter(1),
                Err(ApiError::Validation(ValidationError::OutOfRange { .. }))
            ));
        }
    }
}
