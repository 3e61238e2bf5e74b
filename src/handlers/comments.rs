use std::sync::Arc;

use axum::extract::State;
use axum::response::Redirect;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{non_empty, JsonOrForm};
use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

const LISTING_LIMIT: i64 = 50;

#[derive(Deserialize)]
pub struct CommentForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub content: Option<String>,
}

struct ValidComment {
    name: String,
    email: String,
    content: String,
}

fn validate(form: CommentForm) -> Result<ValidComment, AppError> {
    match (
        non_empty(form.name),
        non_empty(form.email),
        non_empty(form.content),
    ) {
        (Some(name), Some(email), Some(content)) => Ok(ValidComment {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            content: content.trim().to_string(),
        }),
        _ => Err(AppError::Validation(
            "Name, email, and comment are required".to_string(),
        )),
    }
}

// GET /api/comments, GET /get-comments
pub async fn list_comments(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let comments = {
        let conn = state.conn()?;
        queries::list_recent_comments(&conn, LISTING_LIMIT)?
    };
    Ok(Json(json!({ "comments": comments })))
}

// POST /api/comments
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    JsonOrForm(form): JsonOrForm<CommentForm>,
) -> Result<Json<Value>, AppError> {
    let valid = validate(form)?;
    let comment = {
        let conn = state.conn()?;
        queries::insert_comment(&conn, &valid.name, &valid.email, &valid.content)?
    };

    Ok(Json(json!({
        "message": "Comment submitted successfully!",
        "comment": comment,
    })))
}

// POST /submit-comment
pub async fn submit_comment(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, AppError> {
    let Ok(valid) = validate(form) else {
        return Ok(Redirect::to("/?comment=invalid"));
    };

    let conn = state.conn()?;
    queries::insert_comment(&conn, &valid.name, &valid.email, &valid.content)?;
    Ok(Redirect::to("/?comment=submitted"))
}
