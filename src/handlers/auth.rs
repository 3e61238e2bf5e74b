use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{non_empty, AuthUser, JsonOrForm};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::NewUser;
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

// POST /register
#[derive(Deserialize)]
pub struct RegisterForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "confirm-password", alias = "confirm_password")]
    pub confirm_password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonOrForm(form): JsonOrForm<RegisterForm>,
) -> Result<Json<Value>, AppError> {
    let (Some(name), Some(email), Some(password), Some(confirm)) = (
        non_empty(form.name),
        non_empty(form.email),
        non_empty(form.password),
        non_empty(form.confirm_password),
    ) else {
        return Err(AppError::Validation(
            "Name, email, and password are required".to_string(),
        ));
    };
    let email = email.trim().to_lowercase();

    if password != confirm {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    {
        let conn = state.conn()?;
        if queries::get_user_by_email(&conn, &email)?.is_some() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let new_user = NewUser {
        name: name.trim().to_string(),
        email,
        password_hash: state.auth.hash_password(&password)?,
        phone: non_empty(form.phone),
        address: non_empty(form.address),
    };

    let user_id = {
        let conn = state.conn()?;
        queries::insert_user(&conn, &new_user)?
            .ok_or_else(|| AppError::Conflict("Email already exists".to_string()))?
    };
    let token = state.auth.issue_token(user_id)?;

    tracing::info!(user_id, email = %new_user.email, "user registered");

    Ok(Json(json!({
        "message": "Registered successfully!",
        "redirect": "/login",
        "access_token": token,
    })))
}

// POST /login
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonOrForm(form): JsonOrForm<LoginForm>,
) -> Result<Json<Value>, AppError> {
    let (Some(email), Some(password)) = (non_empty(form.email), non_empty(form.password)) else {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    };
    let email = email.trim().to_lowercase();

    let user = {
        let conn = state.conn()?;
        queries::get_user_by_email(&conn, &email)?
    };

    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
    let user = user.ok_or_else(invalid)?;
    if !state.auth.verify_password(&password, &user.password_hash)? {
        tracing::info!(user_id = user.id, "login rejected");
        return Err(invalid());
    }

    let token = state.auth.issue_token(user.id)?;

    Ok(Json(json!({
        "message": "Login successful",
        "access_token": token,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
        },
        "redirect": "/",
    })))
}

// GET /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
) -> Result<Json<Value>, AppError> {
    if let Some(user) = user {
        let conn = state.conn()?;
        queries::revoke_token(&conn, &user.token_id)?;
        tracing::info!(user_id = user.user_id, "token revoked");
    }

    Ok(Json(json!({
        "message": "Logged out successfully",
        "redirect": "/login",
    })))
}
