//! Todo CRUD endpoints. Every operation is scoped to the authenticated
//! user; mutations check ownership before touching the row.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateTodoRequest, Todo, UpdateTodoRequest, User};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::response::ApiResponse;
use super::validation::{validate_description, validate_status, validate_title, validate_uuid};

fn validate_create_request(req: &CreateTodoRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_title(&req.title) {
        errors.add("title", &e);
    }
    if let Err(e) = validate_description(&req.description) {
        errors.add("description", &e);
    }
    if let Err(e) = validate_status(&req.status) {
        errors.add("status", &e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateTodoRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref title) = req.title {
        if let Err(e) = validate_title(title) {
            errors.add("title", &e);
        }
    }
    if let Err(e) = validate_description(&req.description) {
        errors.add("description", &e);
    }
    if let Some(ref status) = req.status {
        if let Err(e) = validate_status(status) {
            errors.add("status", &e);
        }
    }

    errors.finish()
}

/// Fetch a todo and check it belongs to the requesting user.
///
/// Existence is checked before ownership, so a missing todo is a 404
/// and a foreign one a 403. The read and the following write are not
/// wrapped in a transaction.
async fn find_owned_todo(
    state: &AppState,
    todo_id: &str,
    user_id: &str,
    action: &str,
) -> Result<Todo, ApiError> {
    let todo: Option<Todo> = sqlx::query_as("SELECT * FROM todos WHERE id = ?")
        .bind(todo_id)
        .fetch_optional(&state.db)
        .await?;

    let todo = todo.ok_or_else(|| ApiError::not_found("Todo not found"))?;

    if todo.user_id != user_id {
        return Err(ApiError::forbidden(format!(
            "Not authorized to {} this todo",
            action
        )));
    }

    Ok(todo)
}

/// Create a new todo owned by the authenticated user
pub async fn create_todo(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateTodoRequest>,
) -> Result<ApiResponse<Todo>, ApiError> {
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO todos (id, title, description, status, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.status)
    .bind(&user.id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let todo: Todo = sqlx::query_as("SELECT * FROM todos WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(ApiResponse::created("Todo created successfully", todo))
}

/// List all todos owned by the authenticated user
pub async fn list_todos(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<ApiResponse<Vec<Todo>>, ApiError> {
    let todos: Vec<Todo> =
        sqlx::query_as("SELECT * FROM todos WHERE user_id = ? ORDER BY created_at DESC")
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?;

    Ok(ApiResponse::ok("Todos retrieved successfully", todos))
}

/// Partially update a todo
pub async fn update_todo(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateTodoRequest>,
) -> Result<ApiResponse<Todo>, ApiError> {
    if let Err(e) = validate_uuid(&id, "todo_id") {
        return Err(ApiError::validation_field("todo_id", e));
    }
    validate_update_request(&req)?;

    find_owned_todo(&state, &id, &user.id, "update").await?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE todos SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            status = COALESCE(?, status),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.status)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let todo: Todo = sqlx::query_as("SELECT * FROM todos WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(ApiResponse::ok("Todo updated successfully", todo))
}

/// Delete a todo
pub async fn delete_todo(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    if let Err(e) = validate_uuid(&id, "todo_id") {
        return Err(ApiError::validation_field("todo_id", e));
    }

    find_owned_todo(&state, &id, &user.id, "delete").await?;

    sqlx::query("DELETE FROM todos WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    Ok(ApiResponse::ok(
        "Todo deleted successfully",
        serde_json::Value::Null,
    ))
}
