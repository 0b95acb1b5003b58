//! GET /blobs/{key}: signed photo retrieval
//!
//! Target of the URLs handed out by the photo read endpoint. Needs no bearer
//! token; the signature in the query string is the credential.

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use store::{content_type_for, unix_now};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: u64,
    pub signature: String,
}

pub async fn get_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, ApiError> {
    let blobs = &state.signed_blobs;
    blobs
        .verify(&key, query.expires, &query.signature, unix_now())
        .map_err(|e| ApiError::Forbidden(e.to_string()))?;

    let content = blobs
        .read_object(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound("Object not found".into()))?;
    debug!(key, bytes = content.len(), "serving signed object");

    Ok(([(CONTENT_TYPE, content_type_for(&key))], content).into_response())
}
