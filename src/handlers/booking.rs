use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{non_empty, AuthUser, JsonOrForm};
use crate::errors::AppError;
use crate::services::booking::{self, BookingInput};
use crate::state::AppState;

/// Form posts send ids as text, JSON clients as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
}

impl IdInput {
    fn into_string(self) -> String {
        match self {
            IdInput::Number(n) => n.to_string(),
            IdInput::Text(s) => s,
        }
    }
}

// POST /book
#[derive(Deserialize)]
pub struct BookForm {
    pub doctor_id: Option<IdInput>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
}

pub async fn book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonOrForm(form): JsonOrForm<BookForm>,
) -> Result<Json<Value>, AppError> {
    let input = BookingInput {
        doctor_id: form.doctor_id.map(IdInput::into_string),
        date: form.date,
        time: form.time,
        reason: form.reason,
    };

    let confirmation = booking::book_appointment(&state, user.user_id, input).await?;

    Ok(Json(json!({
        "message": "Appointment created, proceed to payment",
        "payment_url": confirmation.payment_url,
        "appointment_id": confirmation.appointment_id,
    })))
}

// GET /payment_callback
#[derive(Deserialize)]
pub struct CallbackQuery {
    pub tx_ref: Option<String>,
    pub transaction_id: Option<String>,
    pub status: Option<String>,
}

pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let (Some(tx_ref), Some(transaction_id), Some(status)) = (
        non_empty(query.tx_ref),
        non_empty(query.transaction_id),
        non_empty(query.status),
    ) else {
        return Err(AppError::Validation(
            "Invalid callback parameters".to_string(),
        ));
    };

    if status != "successful" {
        tracing::info!(tx_ref = %tx_ref, status = %status, "payment reported unsuccessful");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Payment was not successful",
                "status": status,
            })),
        )
            .into_response());
    }

    let appointment = booking::confirm_payment(&state, &tx_ref, &transaction_id).await?;

    Ok(Json(json!({
        "message": "Payment successful, appointment confirmed!",
        "appointment": appointment,
        "redirect": "/profile",
    }))
    .into_response())
}

// POST /api/appointments/:id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    booking::cancel_appointment(&state, user.user_id, id)?;
    Ok(Json(json!({ "message": "Appointment cancelled" })))
}
