// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{create_test_app, json_body, ATHLETE_ID};
use tower::ServiceExt;
use workout_ingest::config::Config;
use workout_ingest::middleware::auth::TOKEN_COOKIE;
use workout_ingest::middleware::create_jwt;

#[tokio::test]
async fn test_health_is_public() {
    let app = create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_ingest_requires_auth() {
    let app = create_test_app();

    for (method, uri) in [
        ("POST", "/api/ingest"),
        ("GET", "/api/ingest"),
        ("GET", "/api/ingest/some-id"),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }
    assert_eq!(app.db.staging_count(), 0);
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let app = create_test_app();
    let forged = create_jwt(ATHLETE_ID, b"not_the_server_key_0123456789abc").unwrap();

    for auth in ["Bearer garbage".to_string(), format!("Bearer {}", forged)] {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/ingest")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_cookie_token_accepted() {
    let app = create_test_app();
    let token = create_jwt(ATHLETE_ID, &Config::test_default().jwt_signing_key).unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/ingest")
                .header(header::COOKIE, format!("{}={}", TOKEN_COOKIE, token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
