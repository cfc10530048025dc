mod common;

use axum::http::StatusCode;
use bookstore::db::UserRole;
use bookstore::jwt::VerificationOutcome;
use common::{PASSWORD, body_json, create_test_app, create_user, json_request, token_codec};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_login_success() {
    let test = create_test_app().await;
    let id = create_user(&test.db, "alice", UserRole::User, true).await;

    let response = test
        .app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({"username": "alice", "password": PASSWORD}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], id.to_string());
    assert_eq!(
        body["expiresAt"].as_u64().unwrap() - body["issuedAt"].as_u64().unwrap(),
        3600
    );

    match token_codec().verify(body["token"].as_str().unwrap()) {
        VerificationOutcome::Valid(claims) => {
            assert_eq!(claims.sub, id.to_string());
            assert_eq!(claims.role, "USER");
            assert_eq!(claims.username, "alice");
        }
        other => panic!("expected a valid token, got {:?}", other),
    }
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let test = create_test_app().await;
    create_user(&test.db, "alice", UserRole::User, true).await;
    create_user(&test.db, "bob", UserRole::User, false).await;

    let attempts = [
        json!({"username": "nobody", "password": PASSWORD}),
        json!({"username": "bob", "password": PASSWORD}),
        json!({"username": "alice", "password": "wrong password"}),
    ];

    let mut bodies = Vec::new();
    for attempt in attempts {
        let response = test
            .app
            .clone()
            .oneshot(json_request("POST", "/api/auth/login", attempt))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(body_json(response).await);
    }

    assert_eq!(bodies[0], json!({"error": "Authentication failed"}));
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
}

#[tokio::test]
async fn test_login_ignores_stale_bearer_header() {
    let test = create_test_app().await;
    create_user(&test.db, "alice", UserRole::User, true).await;

    let mut request = json_request(
        "POST",
        "/api/auth/login",
        json!({"username": "alice", "password": PASSWORD}),
    );
    request
        .headers_mut()
        .insert("authorization", "Bearer expired.or.garbage".parse().unwrap());

    let response = test.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_rate_limited() {
    use std::num::NonZeroU32;

    let test = common::create_test_app_with_limits(bookstore::rate_limit::RateLimits {
        login_per_minute: NonZeroU32::new(2).unwrap(),
        register_per_minute: NonZeroU32::new(2).unwrap(),
    })
    .await;

    let attempt = || {
        json_request(
            "POST",
            "/api/auth/login",
            json!({"username": "nobody", "password": "whatever1"}),
        )
    };

    for _ in 0..2 {
        let response = test.app.clone().oneshot(attempt()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = test.app.clone().oneshot(attempt()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
