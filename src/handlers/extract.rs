use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::{Form, Json};
use serde::de::DeserializeOwned;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

/// The caller identified by a valid, unrevoked bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub token_id: String,
}

fn auth_required() -> AppError {
    AppError::Unauthorized("Authentication required".to_string())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(auth_required)?;

        let claims = state.auth.verify_token(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            auth_required()
        })?;
        let user_id = claims.user_id().ok_or_else(auth_required)?;

        let conn = state.conn()?;
        if queries::is_token_revoked(&conn, &claims.jti)? {
            return Err(auth_required());
        }

        Ok(AuthUser {
            user_id,
            token_id: claims.jti,
        })
    }
}

/// Accepts a JSON body when the request says so, a urlencoded form otherwise.
pub struct JsonOrForm<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send + 'static,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            Ok(JsonOrForm(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            Ok(JsonOrForm(value))
        }
    }
}

/// Blank form fields count as missing.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
