//! POST /token: client-credentials grant

use axum::extract::State;
use axum::{Form, Json};
use peoplesuite_auth::{TokenRequest, TokenResponse};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics;

pub async fn issue_token(
    State(state): State<AppState>,
    Form(request): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let response = peoplesuite_auth::issue_token(state.credentials.as_ref(), &request).await?;
    metrics::record_token_issued();
    Ok(Json(response))
}
