use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use crate::config::Config;
use crate::{api, db, AppState};

async fn setup_app() -> Router {
    // In-memory SQLite database for testing. One connection, so every
    // query sees the same database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    db::migrate(&pool).await.expect("Failed to run migrations");

    let state = Arc::new(AppState::new(Config::default(), pool));
    api::create_router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

/// Sign up a user and return (token, user_id)
async fn signup(app: &Router, name: &str, email: &str, password: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({"name": name, "email": email, "password": password})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);

    let token = body["data"]["token"].as_str().unwrap().to_string();
    let user_id = body["data"]["user"]["id"].as_str().unwrap().to_string();
    (token, user_id)
}

async fn create_todo(app: &Router, token: &str, title: &str, status_value: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/todos",
        Some(token),
        Some(json!({"title": title, "status": status_value})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_signup_returns_envelope_without_password() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "secret1"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["statusCode"], 201);
    assert_eq!(body["message"], "User created successfully");
    assert!(body["data"]["token"].is_string());
    assert!(body["data"]["expiresAt"].is_string());
    assert_eq!(body["data"]["user"]["email"], "ada@example.com");

    // Credential material never leaves the service boundary
    let user = body["data"]["user"].as_object().unwrap();
    assert!(!user.contains_key("password"));
    assert!(!user.contains_key("passwordHash"));
    assert!(!user.contains_key("password_hash"));
}

#[tokio::test]
async fn test_signup_duplicate_email() {
    let app = setup_app().await;
    signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({"name": "Imposter", "email": "ada@example.com", "password": "secret2"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_signin_returns_token() {
    let app = setup_app().await;
    signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        None,
        Some(json!({"email": "ada@example.com", "password": "secret1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Signed in successfully");
    assert!(body["data"]["token"].is_string());
    assert!(body["data"]["expiresAt"].is_string());
}

#[tokio::test]
async fn test_signin_wrong_password() {
    let app = setup_app().await;
    signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        None,
        Some(json!({"email": "ada@example.com", "password": "wrong-password"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_signin_unknown_email_same_error() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        None,
        Some(json!({"email": "nobody@example.com", "password": "secret1"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_todos_require_auth() {
    let app = setup_app().await;

    let (status, _) = send(&app, "GET", "/api/v1/todos", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/v1/todos", Some("bogus-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_list_todos() {
    let app = setup_app().await;
    let (token, user_id) = signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/todos",
        Some(&token),
        Some(json!({"title": "Buy milk", "status": "pending"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["title"], "Buy milk");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["userId"], Value::String(user_id));
    assert!(body["data"]["description"].is_null());

    let (status, body) = send(&app, "GET", "/api/v1/todos", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Todos retrieved successfully");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_only_own_todos() {
    let app = setup_app().await;
    let (token_a, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;
    let (token_b, _) = signup(&app, "Bob", "bob@example.com", "secret2").await;

    create_todo(&app, &token_a, "Ada's task", "pending").await;

    let (status, body) = send(&app, "GET", "/api/v1/todos", Some(&token_b), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_todo_invalid_status() {
    let app = setup_app().await;
    let (token, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/todos",
        Some(&token),
        Some(json!({"title": "Buy milk", "status": "archived"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("status"));
}

#[tokio::test]
async fn test_update_todo_partial() {
    let app = setup_app().await;
    let (token, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;
    let id = create_todo(&app, &token, "Buy milk", "pending").await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/v1/todos/{}", id),
        Some(&token),
        Some(json!({"status": "done"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Todo updated successfully");
    assert_eq!(body["data"]["status"], "done");
    // Fields not in the request are untouched
    assert_eq!(body["data"]["title"], "Buy milk");
}

#[tokio::test]
async fn test_update_todo_not_found() {
    let app = setup_app().await;
    let (token, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/todos/550e8400-e29b-41d4-a716-446655440000",
        Some(&token),
        Some(json!({"status": "done"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Todo not found");
}

#[tokio::test]
async fn test_update_todo_invalid_id_format() {
    let app = setup_app().await;
    let (token, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, _) = send(
        &app,
        "PATCH",
        "/api/v1/todos/not-a-uuid",
        Some(&token),
        Some(json!({"status": "done"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cross_user_update_forbidden() {
    let app = setup_app().await;
    let (token_a, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;
    let (token_b, _) = signup(&app, "Bob", "bob@example.com", "secret2").await;
    let id = create_todo(&app, &token_a, "Ada's task", "pending").await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/v1/todos/{}", id),
        Some(&token_b),
        Some(json!({"status": "done"})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to update this todo");

    // The record is not mutated
    let (_, body) = send(&app, "GET", "/api/v1/todos", Some(&token_a), None).await;
    assert_eq!(body["data"][0]["status"], "pending");
}

#[tokio::test]
async fn test_cross_user_delete_forbidden() {
    let app = setup_app().await;
    let (token_a, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;
    let (token_b, _) = signup(&app, "Bob", "bob@example.com", "secret2").await;
    let id = create_todo(&app, &token_a, "Ada's task", "pending").await;

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/v1/todos/{}", id),
        Some(&token_b),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to delete this todo");

    // Still there for its owner
    let (_, body) = send(&app, "GET", "/api/v1/todos", Some(&token_a), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_todo_then_404() {
    let app = setup_app().await;
    let (token, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;
    let id = create_todo(&app, &token, "Buy milk", "pending").await;

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/v1/todos/{}", id),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Todo deleted successfully");
    assert!(body["data"].is_null());

    // Delete is not idempotent: the second attempt is a 404
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/todos/{}", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_update_name() {
    let app = setup_app().await;
    let (token, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/profile",
        Some(&token),
        Some(json!({"name": "Ada Lovelace"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Profile updated successfully");
    assert_eq!(body["data"]["name"], "Ada Lovelace");
    assert_eq!(body["data"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_profile_update_requires_a_field() {
    let app = setup_app().await;
    let (token, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(&app, "PATCH", "/api/v1/profile", Some(&token), Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "At least one field must be provided for update");
}

#[tokio::test]
async fn test_profile_email_conflict() {
    let app = setup_app().await;
    signup(&app, "Ada", "ada@example.com", "secret1").await;
    let (token_b, _) = signup(&app, "Bob", "bob@example.com", "secret2").await;

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/profile",
        Some(&token_b),
        Some(json!({"email": "ada@example.com"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");

    // Both records unchanged
    let (_, body) = send(&app, "GET", "/api/v1/todos", Some(&token_b), None).await;
    assert_eq!(body["statusCode"], 200);
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        None,
        Some(json!({"email": "bob@example.com", "password": "secret2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_password_change_never_echoed() {
    let app = setup_app().await;
    let (token, _) = signup(&app, "Ada", "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/profile",
        Some(&token),
        Some(json!({"password": "new-secret"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let user = body["data"].as_object().unwrap();
    assert!(!user.contains_key("password"));
    assert!(!user.contains_key("passwordHash"));
    assert!(!user.contains_key("password_hash"));

    // Old password no longer works, new one does
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        None,
        Some(json!({"email": "ada@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        None,
        Some(json!({"email": "ada@example.com", "password": "new-secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_check() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
