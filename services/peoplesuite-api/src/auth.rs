//! Bearer token gate for protected routes
//!
//! Applied with `route_layer`, so it only runs for requests that matched a
//! protected route and always runs before the handler.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;
use crate::metrics;

pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let outcome = match peoplesuite_auth::parse_bearer(header) {
        Ok(token) => peoplesuite_auth::authorize(state.credentials.as_ref(), token).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        let reason = match &e {
            peoplesuite_auth::Error::MissingToken => "missing",
            peoplesuite_auth::Error::Store(_) => "store_error",
            _ => "invalid",
        };
        metrics::record_auth_failure(reason);
        warn!(reason, path = %request.uri().path(), "rejected protected request");
        return Err(e.into());
    }

    Ok(next.run(request).await)
}
