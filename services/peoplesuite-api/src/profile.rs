//! Employee profile resource
//!
//! Create is an upsert: the full record is written under the path's
//! employee id with no duplicate check. Read returns the stored record or 404.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use store::EmployeeProfile;
use tracing::{info, instrument};

use crate::AppState;
use crate::error::ApiError;

/// JSON body of a profile upload.
#[derive(Debug, Deserialize)]
pub struct ProfilePayload {
    pub first_name: String,
    pub last_name: String,
    pub start_date: String,
    pub country: String,
}

#[instrument(skip_all, fields(employee_id = %employee_id))]
pub async fn create_profile(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    Json(payload): Json<ProfilePayload>,
) -> Result<Json<EmployeeProfile>, ApiError> {
    let profile = EmployeeProfile {
        employee_id,
        first_name: payload.first_name,
        last_name: payload.last_name,
        start_date: payload.start_date,
        country: payload.country,
    };
    state.profiles.put_profile(profile.clone()).await?;
    info!("stored employee profile");
    Ok(Json(profile))
}

#[instrument(skip_all, fields(employee_id = %employee_id))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<EmployeeProfile>, ApiError> {
    state
        .profiles
        .get_profile(&employee_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Employee not found".into()))
}
