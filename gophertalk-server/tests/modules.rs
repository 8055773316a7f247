//! End-to-end module flows over the in-memory backend

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{test_app, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn register_login_refresh() {
    let app = test_app();
    let (id, tokens) = app.register("gopher").await;
    assert!(id > 0);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "user_name": "gopher", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": tokens.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["refresh_token"].is_string());

    // An access token is not a refresh token
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": tokens.access_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "wrong_token_kind");
    app.assert_released();
}

#[tokio::test]
async fn duplicate_user_name_conflicts() {
    let app = test_app();
    app.register("gopher").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "user_name": "gopher",
                "password": PASSWORD,
                "password_confirm": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    app.assert_released();
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = test_app();
    app.register("gopher").await;

    for (user_name, password) in [("gopher", "Wrong42$"), ("nobody_here", PASSWORD)] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "user_name": user_name, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_credentials");
    }
    app.assert_released();
}

#[tokio::test]
async fn registration_is_validated_before_the_pool() {
    let app = test_app();
    let cases = [
        json!({ "user_name": "1gopher", "password": PASSWORD, "password_confirm": PASSWORD }),
        json!({ "user_name": "gopher", "password": "weakpass", "password_confirm": "weakpass" }),
        json!({ "user_name": "gopher", "password": PASSWORD, "password_confirm": "Other42$" }),
        json!({ "user_name": "gopher", "password": PASSWORD, "password_confirm": PASSWORD, "first_name": "Ada1" }),
        json!({ "user_name": "gopher" }),
    ];

    for body in cases {
        let (status, response) = app
            .send(Method::POST, "/api/auth/register", None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} -> {response}");
    }
    assert_eq!(app.pool.status().acquired_total, 0);
    assert_eq!(app.store.operations(), 0);
}

#[tokio::test]
async fn post_feed_flow() {
    let app = test_app();
    let (author, author_tokens) = app.register("author").await;
    let (_, reader_tokens) = app.register("reader").await;
    let author_token = author_tokens.access_token.as_str();
    let reader_token = reader_tokens.access_token.as_str();

    let first = app.create_post(author_token, "Hello Gophers", None).await;
    let second = app.create_post(author_token, "second post", None).await;
    let first_id = first["id"].as_i64().unwrap();
    assert_eq!(first["user_id"], author);
    assert_eq!(first["likes_count"], 0);

    let reply = app
        .create_post(reader_token, "welcome!", Some(first_id))
        .await;
    assert_eq!(reply["reply_to_id"], first_id);

    // Top-level feed, newest first
    let (status, feed) = app.send(Method::GET, "/api/posts", Some(reader_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second["id"].as_i64().unwrap(), first_id]);

    // Replies
    let (_, replies) = app
        .send(
            Method::GET,
            &format!("/api/posts?reply_to_id={first_id}"),
            Some(reader_token),
            None,
        )
        .await;
    assert_eq!(replies.as_array().unwrap().len(), 1);

    // Search is case-insensitive
    let (_, found) = app
        .send(Method::GET, "/api/posts?search=hello", Some(reader_token), None)
        .await;
    assert_eq!(found.as_array().unwrap().len(), 1);

    // Like and view
    let like = format!("/api/posts/{first_id}/like");
    let view = format!("/api/posts/{first_id}/view");
    assert_eq!(app.send(Method::POST, &view, Some(reader_token), None).await.0, StatusCode::CREATED);
    assert_eq!(app.send(Method::POST, &view, Some(reader_token), None).await.0, StatusCode::CREATED);
    assert_eq!(app.send(Method::POST, &like, Some(reader_token), None).await.0, StatusCode::CREATED);
    let (status, body) = app.send(Method::POST, &like, Some(reader_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (_, feed) = app
        .send(Method::GET, &format!("/api/posts?owner_id={author}"), Some(reader_token), None)
        .await;
    let liked = feed
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == first_id)
        .unwrap()
        .clone();
    assert_eq!(liked["likes_count"], 1);
    assert_eq!(liked["views_count"], 1);
    assert_eq!(liked["replies_count"], 1);
    assert_eq!(liked["user_liked"], true);
    assert_eq!(liked["user_viewed"], true);

    // Flags for another viewer
    let (_, feed) = app
        .send(
            Method::GET,
            &format!("/api/posts?owner_id={author}&user_id={author}"),
            Some(reader_token),
            None,
        )
        .await;
    assert!(feed
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["user_liked"] == false));

    // Unlike
    assert_eq!(app.send(Method::DELETE, &like, Some(reader_token), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.send(Method::DELETE, &like, Some(reader_token), None).await.0, StatusCode::NOT_FOUND);

    // Only the author deletes
    let post_uri = format!("/api/posts/{first_id}");
    assert_eq!(app.send(Method::DELETE, &post_uri, Some(reader_token), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.send(Method::DELETE, &post_uri, Some(author_token), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.send(Method::POST, &like, Some(reader_token), None).await.0, StatusCode::NOT_FOUND);

    // No new replies under a deleted post
    let (status, _) = app
        .send(
            Method::POST,
            "/api/posts",
            Some(reader_token),
            Some(json!({ "text": "late reply", "reply_to_id": first_id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, feed) = app.send(Method::GET, "/api/posts", Some(reader_token), None).await;
    assert_eq!(feed.as_array().unwrap().len(), 1);
    app.assert_released();
}

#[tokio::test]
async fn post_input_is_validated() {
    let app = test_app();
    let (_, tokens) = app.register("gopher").await;
    let token = Some(tokens.access_token.as_str());
    let before = app.store.operations();

    let long = "x".repeat(281);
    for body in [
        json!({ "text": "" }),
        json!({ "text": long }),
        json!({ "text": "hi", "reply_to_id": 0 }),
        json!({ "text": 5 }),
    ] {
        let (status, _) = app.send(Method::POST, "/api/posts", token, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    for uri in ["/api/posts?limit=0", "/api/posts?offset=-1", "/api/posts?limit=ten"] {
        let (status, _) = app.send(Method::GET, uri, token, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    for uri in ["/api/posts/0/like", "/api/posts/abc/like", "/api/posts/-3/view"] {
        let (status, _) = app.send(Method::POST, uri, token, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert_eq!(app.store.operations(), before);

    let (status, _) = app
        .send(Method::POST, "/api/posts", token, Some(json!({ "text": "hi", "reply_to_id": 999 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    app.assert_released();
}

#[tokio::test]
async fn user_profile_flow() {
    let app = test_app();
    let (me, tokens) = app.register("gopher").await;
    let (other, _) = app.register("rustacean").await;
    let token = Some(tokens.access_token.as_str());

    let (status, users) = app.send(Method::GET, "/api/users?limit=1", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);

    let (status, user) = app.send(Method::GET, &format!("/api/users/{me}"), token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["user_name"], "gopher");
    assert!(user.get("password_hash").is_none());

    let (status, _) = app.send(Method::GET, "/api/users/9999", token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let me_uri = format!("/api/users/{me}");
    let (status, user) = app
        .send(Method::PATCH, &me_uri, token, Some(json!({ "last_name": "Lovelace" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["last_name"], "Lovelace");
    assert_eq!(user["first_name"], "Ada");

    let (status, _) = app
        .send(Method::PATCH, &me_uri, token, Some(json!({ "user_name": "rustacean" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.send(Method::PATCH, &me_uri, token, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::PATCH, &me_uri, token, Some(json!({ "password": "New42$pw" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "password change needs confirmation");

    // A lone confirmation is not silently dropped alongside other changes
    let (status, _) = app
        .send(
            Method::PATCH,
            &me_uri,
            token,
            Some(json!({ "first_name": "Bob", "password_confirm": "Other42$" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, user) = app.send(Method::GET, &me_uri, token, None).await;
    assert_eq!(user["first_name"], "Ada");

    let (status, _) = app
        .send(
            Method::PATCH,
            &me_uri,
            token,
            Some(json!({ "password": "New42$pw", "password_confirm": "New42$pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "user_name": "gopher", "password": "New42$pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let other_uri = format!("/api/users/{other}");
    let (status, body) = app
        .send(Method::PATCH, &other_uri, token, Some(json!({ "first_name": "Eve" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(app.send(Method::DELETE, &other_uri, token, None).await.0, StatusCode::FORBIDDEN);

    assert_eq!(app.send(Method::DELETE, &me_uri, token, None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.send(Method::GET, &me_uri, token, None).await.0, StatusCode::NOT_FOUND);

    // A deleted account cannot refresh
    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": tokens.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.assert_released();
}

#[tokio::test]
async fn malformed_json_is_rejected_before_any_handler() {
    let app = test_app();

    for uri in ["/api/auth/register", "/api/posts", "/api/users/1"] {
        let request = Request::builder()
            .method(if uri == "/api/users/1" { Method::PATCH } else { Method::POST })
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer not-even-checked")
            .body(Body::from("{\"user_name\": "))
            .unwrap();

        let (status, body) = app.raw(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "bad_request");
    }

    let status = app.pool.status();
    assert_eq!(status.acquired_total, 0);
    assert_eq!(app.store.operations(), 0);
}

#[tokio::test]
async fn credentials_are_checked_without_the_datastore() {
    let app = test_app();
    let (_, tokens) = app.register("gopher").await;
    let acquired = app.pool.status().acquired_total;
    let operations = app.store.operations();

    let mut tampered = tokens.access_token.clone();
    tampered.pop();
    tampered.push(if tokens.access_token.ends_with('A') { 'B' } else { 'A' });

    let foreign = gophertalk_server::auth::TokenService::new(b"some-other-secret")
        .issue(1)
        .unwrap()
        .access_token;

    for token in [Some(tampered.as_str()), Some(foreign.as_str()), Some(""), None] {
        let (status, body) = app.send(Method::GET, "/api/posts", token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{token:?}");
        assert!(body["error"].is_string());
    }

    let request = Request::builder()
        .uri("/api/users")
        .header(header::AUTHORIZATION, format!("Token {}", tokens.access_token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.raw(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "malformed_header");

    assert_eq!(app.pool.status().acquired_total, acquired);
    assert_eq!(app.store.operations(), operations);
}

#[tokio::test]
async fn datastore_outage_is_503() {
    let app = test_app();
    let (_, tokens) = app.register("gopher").await;

    app.store.set_reachable(false);
    let (status, body) = app
        .send(Method::GET, "/api/posts", Some(&tokens.access_token), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");
    app.assert_released();

    app.store.set_reachable(true);
    let (status, _) = app
        .send(Method::GET, "/api/posts", Some(&tokens.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}
