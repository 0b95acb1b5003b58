//! Employee photo resource
//!
//! Photos are stored as blobs keyed `{employee_id}.{ext}`. Re-uploading
//! replaces the object; uploading with a different extension leaves the old
//! object in place under its own key.
//!
//! Reads return a time-limited signed URL rather than the bytes. The read
//! path probes the allowed extensions in `LOOKUP_ORDER` and signs the first
//! key that exists, falling back to `{employee_id}.jpeg` when no photo has
//! been uploaded, so a response always carries a URL.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use serde::Serialize;
use store::BlobStore;
use tracing::{info, instrument};

use crate::AppState;
use crate::error::ApiError;

/// Multipart field carrying the photo
const FILE_FIELD: &str = "file";

/// Extensions accepted on upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Probe order on read; `jpeg` first so the no-photo fallback stays `.jpeg`
const LOOKUP_ORDER: &[&str] = &["jpeg", "jpg", "png"];

#[derive(Debug, Serialize)]
pub struct PhotoUploaded {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct PhotoLocation {
    pub employee_id: String,
    pub photo_url: String,
}

/// Lower-cased extension of `filename` if it is one of `ALLOWED_EXTENSIONS`.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

#[instrument(skip_all, fields(employee_id = %employee_id))]
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<PhotoUploaded>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(allowed_extension)
            .ok_or(ApiError::InvalidFormat)?;
        let key = format!("{employee_id}.{extension}");
        let content = field.bytes().await?;

        state.photos.put_object(&key, content).await?;
        info!(key, "stored employee photo");

        return Ok(Json(PhotoUploaded {
            message: "Photo uploaded successfully".into(),
            filename: key,
        }));
    }

    Err(ApiError::InvalidFormat)
}

#[instrument(skip_all, fields(employee_id = %employee_id))]
pub async fn get_photo(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<PhotoLocation>, ApiError> {
    let key = resolve_photo_key(state.photos.as_ref(), &employee_id).await?;
    let photo_url = state
        .photos
        .presign_get(&key, state.photo_url_expiry)
        .await?;
    Ok(Json(PhotoLocation {
        employee_id,
        photo_url,
    }))
}

async fn resolve_photo_key(photos: &dyn BlobStore, employee_id: &str) -> Result<String, ApiError> {
    for extension in LOOKUP_ORDER {
        let key = format!("{employee_id}.{extension}");
        if photos.object_exists(&key).await? {
            return Ok(key);
        }
    }
    Ok(format!("{employee_id}.{}", LOOKUP_ORDER[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_extensions_are_accepted_case_insensitively() {
        assert_eq!(allowed_extension("me.jpg").as_deref(), Some("jpg"));
        assert_eq!(allowed_extension("me.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("me.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("holiday.2024.png").as_deref(), Some("png"));
    }

    #[test]
    fn other_extensions_are_rejected() {
        for filename in ["me.gif", "me", "me.png.exe", "jpg", "me.", ""] {
            assert!(
                allowed_extension(filename).is_none(),
                "{filename:?} should be rejected"
            );
        }
    }
}
