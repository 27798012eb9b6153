//! Profile endpoint: partial updates to the authenticated user's own
//! record. Password changes are re-hashed; the hash never appears in a
//! response.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::db::{UpdateProfileRequest, User, UserResponse};
use crate::AppState;

use super::auth::hash_password;
use super::error::{ApiError, ValidationErrorBuilder};
use super::response::ApiResponse;
use super::validation::{validate_email, validate_name, validate_password};

fn validate_update_request(req: &UpdateProfileRequest) -> Result<(), ApiError> {
    if req.name.is_none() && req.email.is_none() && req.password.is_none() {
        return Err(ApiError::bad_request(
            "At least one field must be provided for update",
        ));
    }

    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref name) = req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", &e);
        }
    }
    if let Some(ref email) = req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", &e);
        }
    }
    if let Some(ref password) = req.password {
        if let Err(e) = validate_password(password) {
            errors.add("password", &e);
        }
    }

    errors.finish()
}

/// Update the authenticated user's profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    validate_update_request(&req)?;

    let current: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_optional(&state.db)
        .await?;

    let current = current.ok_or_else(|| ApiError::not_found("User not found"))?;

    // Email uniqueness is checked before the update commits
    if let Some(ref email) = req.email {
        if *email != current.email {
            let taken: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&state.db)
                .await?;

            if taken.is_some() {
                return Err(ApiError::bad_request("Email already in use"));
            }
        }
    }

    let password_hash = match req.password {
        Some(ref password) => Some(
            hash_password(password).map_err(|_| ApiError::internal("Failed to hash password"))?,
        ),
        None => None,
    };

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            email = COALESCE(?, email),
            password_hash = COALESCE(?, password_hash),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&user.id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::bad_request("Email already in use")
        } else {
            ApiError::from(e)
        }
    })?;

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(ApiResponse::ok(
        "Profile updated successfully",
        UserResponse::from(updated),
    ))
}
