use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::MIN_PASSWORD_LEN;
use super::extract::{non_empty, AuthUser, JsonOrForm};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::state::AppState;

fn user_json(user: &User) -> Value {
    json!({
        "name": user.name,
        "email": user.email,
        "phone": user.phone,
        "address": user.address,
        "profile_picture": user.profile_picture_or_default(),
    })
}

// GET /api/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.conn()?;
    let user = queries::get_user(&conn, auth.user_id)?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;
    let appointments = queries::get_appointments_for_user(&conn, user.id)?;

    Ok(Json(json!({
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "phone": user.phone,
            "address": user.address,
            "profile_picture": user.profile_picture_or_default(),
            "created_at": user.created_at.format("%Y-%m-%d").to_string(),
        },
        "appointments": appointments,
    })))
}

// POST /profile
#[derive(Deserialize)]
pub struct ProfileForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "current-password", alias = "current_password")]
    pub current_password: Option<String>,
    #[serde(rename = "new-password", alias = "new_password")]
    pub new_password: Option<String>,
    #[serde(rename = "confirm-password", alias = "confirm_password")]
    pub confirm_password: Option<String>,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    JsonOrForm(form): JsonOrForm<ProfileForm>,
) -> Result<Json<Value>, AppError> {
    let email_taken = || AppError::Conflict("Email already in use by another account".to_string());

    let mut user = {
        let conn = state.conn()?;
        let mut user = queries::get_user(&conn, auth.user_id)?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        if let Some(email) = non_empty(form.email) {
            let email = email.trim().to_lowercase();
            if let Some(existing) = queries::get_user_by_email(&conn, &email)? {
                if existing.id != user.id {
                    return Err(email_taken());
                }
            }
            user.email = email;
        }
        user
    };

    if let Some(name) = non_empty(form.name) {
        user.name = name.trim().to_string();
    }
    if let Some(phone) = non_empty(form.phone) {
        user.phone = Some(phone);
    }
    if let Some(address) = non_empty(form.address) {
        user.address = Some(address);
    }

    if let (Some(current), Some(new), Some(confirm)) = (
        non_empty(form.current_password),
        non_empty(form.new_password),
        non_empty(form.confirm_password),
    ) {
        if !state.auth.verify_password(&current, &user.password_hash)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }
        if new != confirm {
            return Err(AppError::Validation("New passwords do not match".to_string()));
        }
        if new.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        user.password_hash = state.auth.hash_password(&new)?;
    }

    {
        let conn = state.conn()?;
        if !queries::update_user(&conn, &user)? {
            return Err(email_taken());
        }
    }

    tracing::info!(user_id = user.id, "profile updated");

    Ok(Json(json!({
        "message": "Profile updated successfully!",
        "user": user_json(&user),
        "profile_picture": user.profile_picture_or_default(),
    })))
}
