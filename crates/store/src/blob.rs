//! Directory-backed object store with pre-signed retrieval URLs
//!
//! Objects live as flat files under `root`, one file per key. Retrieval URLs
//! have the form `{public_url}/blobs/{key}?expires={unix}&signature={sig}`
//! where `sig = BASE64URL(HMAC-SHA256(signing_key, key "\n" expires))`. The
//! service's blob route checks the signature and expiry before serving bytes,
//! so a URL grants read access to exactly one object until it expires.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use common::Secret;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::{BlobStore, StoreFuture};

type HmacSha256 = Hmac<Sha256>;

/// Reasons a presented retrieval URL is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signed URL has expired")]
    Expired,

    #[error("signature does not match")]
    Mismatch,
}

pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
    /// MAC state keyed once at open; cloned per signature
    mac: HmacSha256,
    /// Suffix for upload temp files so concurrent writes of one key never share one
    uploads: AtomicU64,
}

impl LocalBlobStore {
    /// Open (and create if needed) the object directory.
    pub async fn open(
        root: PathBuf,
        public_url: impl Into<String>,
        signing_key: Secret<Vec<u8>>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::Io(format!("creating {}: {e}", root.display())))?;
        let mac = HmacSha256::new_from_slice(signing_key.expose())
            .map_err(|e| StoreError::InvalidKey(format!("signing key: {e}")))?;
        Ok(Self {
            root,
            public_url: public_url.into().trim_end_matches('/').to_owned(),
            mac,
            uploads: AtomicU64::new(0),
        })
    }

    /// URL for `key` valid until `expires_at` (unix seconds).
    pub fn signed_url(&self, key: &str, expires_at: u64) -> String {
        format!(
            "{}/blobs/{}?expires={}&signature={}",
            self.public_url,
            encode_path_segment(key),
            expires_at,
            self.sign(key, expires_at)
        )
    }

    pub fn sign(&self, key: &str, expires_at: u64) -> String {
        URL_SAFE_NO_PAD.encode(self.keyed(key, expires_at).finalize().into_bytes())
    }

    fn keyed(&self, key: &str, expires_at: u64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(format!("{key}\n{expires_at}").as_bytes());
        mac
    }

    /// Check a presented signature for `key` against the clock value `now`.
    pub fn verify(
        &self,
        key: &str,
        expires_at: u64,
        signature: &str,
        now: u64,
    ) -> std::result::Result<(), SignatureError> {
        let presented = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::Mismatch)?;
        self.keyed(key, expires_at)
            .verify_slice(&presented)
            .map_err(|_| SignatureError::Mismatch)?;
        if now >= expires_at {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }

    /// Read an object's bytes, or `None` if no object exists under `key`.
    pub async fn read_object(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!("reading object {key}: {e}"))),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Private temp path for one upload of `key`. Keys never start with '.',
    /// so temp files cannot shadow an object.
    fn upload_path(&self, key: &str) -> PathBuf {
        let n = self.uploads.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(".{key}.upload.{}.{n}", std::process::id()))
    }
}

async fn write_then_rename(tmp_path: &Path, path: &Path, key: &str, content: &[u8]) -> Result<()> {
    tokio::fs::write(tmp_path, content)
        .await
        .map_err(|e| StoreError::Io(format!("writing object {key}: {e}")))?;
    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|e| StoreError::Io(format!("committing object {key}: {e}")))
}

impl BlobStore for LocalBlobStore {
    fn put_object<'a>(&'a self, key: &'a str, content: Bytes) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.object_path(key)?;
            let tmp_path = self.upload_path(key);
            if let Err(e) = write_then_rename(&tmp_path, &path, key, &content).await {
                match tokio::fs::remove_file(&tmp_path).await {
                    Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                        warn!(key, error = %cleanup, "failed to remove upload temp file");
                    }
                    _ => {}
                }
                return Err(e);
            }
            debug!(key, bytes = content.len(), "stored object");
            Ok(())
        })
    }

    fn object_exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let path = self.object_path(key)?;
            tokio::fs::try_exists(&path)
                .await
                .map_err(|e| StoreError::Io(format!("checking object {key}: {e}")))
        })
    }

    fn presign_get<'a>(&'a self, key: &'a str, expires_in: Duration) -> StoreFuture<'a, String> {
        Box::pin(async move {
            validate_key(key)?;
            let expires_at = unix_now().saturating_add(expires_in.as_secs());
            Ok(self.signed_url(key, expires_at))
        })
    }
}

/// Content type served for an object, derived from its key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Keys map straight to file names, so anything that could escape `root`
/// or collide with temp files is refused.
fn validate_key(key: &str) -> Result<()> {
    let invalid = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0'])
        || Path::new(key).components().count() != 1;
    if invalid {
        return Err(StoreError::InvalidKey(key.to_owned()));
    }
    Ok(())
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_path_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
