use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Doctor;
use crate::state::AppState;

#[derive(Serialize)]
pub struct DoctorSummary {
    id: i64,
    name: String,
    specialty: String,
}

// GET /api/doctors
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DoctorSummary>>, AppError> {
    let doctors = {
        let conn = state.conn()?;
        queries::list_doctors(&conn)?
    };

    let response = doctors
        .into_iter()
        .map(|d| DoctorSummary {
            id: d.id,
            name: d.name,
            specialty: d.specialty,
        })
        .collect();

    Ok(Json(response))
}

// GET /api/doctors/:id
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Doctor>, AppError> {
    let doctor = {
        let conn = state.conn()?;
        queries::get_doctor(&conn, id)?
    };
    doctor
        .map(Json)
        .ok_or_else(|| AppError::NotFound("doctor".to_string()))
}
