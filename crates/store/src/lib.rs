//! Storage contracts for the PeopleSuite API
//!
//! Defines the three stores the service depends on as dyn-compatible traits,
//! so handlers receive `Arc<dyn ...>` handles built once at startup and tests
//! can swap in in-memory tables:
//! - `CredentialStore`: client id -> secret + currently issued access token
//! - `ProfileStore`: employee id -> profile fields
//! - `BlobStore`: object key -> bytes, with time-limited retrieval URLs
//!
//! The bundled backends are `Table` (JSON file key-value table) and
//! `LocalBlobStore` (directory-backed objects with signed URLs).

pub mod blob;
pub mod error;
pub mod table;
pub mod types;

pub use blob::{LocalBlobStore, SignatureError, content_type_for, unix_now};
pub use error::{Result, StoreError};
pub use table::Table;
pub use types::{ClientCredential, EmployeeProfile};

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by store operations.
///
/// Uses `Pin<Box<dyn Future>>` for dyn-compatibility (`Arc<dyn CredentialStore>`).
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Key-value table of client credentials.
///
/// One row per client. Rows are provisioned out of band; the service only
/// ever rewrites the `access_token` column.
pub trait CredentialStore: Send + Sync {
    /// Fetch a single credential row by client id.
    fn get_credential<'a>(&'a self, client_id: &'a str)
    -> StoreFuture<'a, Option<ClientCredential>>;

    /// Overwrite the client's current access token.
    ///
    /// Fails with `StoreError::NotFound` if the client row does not exist.
    fn set_access_token<'a>(&'a self, client_id: &'a str, token: &'a str) -> StoreFuture<'a, ()>;

    /// Full scan for rows whose current access token equals `token`.
    ///
    /// Returns the matching client ids.
    fn scan_access_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Vec<String>>;
}

/// Key-value table of employee profiles.
pub trait ProfileStore: Send + Sync {
    /// Write the full record under its employee id, replacing any existing row.
    fn put_profile(&self, profile: EmployeeProfile) -> StoreFuture<'_, ()>;

    fn get_profile<'a>(&'a self, employee_id: &'a str) -> StoreFuture<'a, Option<EmployeeProfile>>;
}

/// Object store for employee photos.
pub trait BlobStore: Send + Sync {
    /// Store `content` under `key`, replacing any previous object.
    fn put_object<'a>(&'a self, key: &'a str, content: Bytes) -> StoreFuture<'a, ()>;

    fn object_exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// Build a retrieval URL for `key` that stops working after `expires_in`.
    ///
    /// Does not check that the object exists.
    fn presign_get<'a>(&'a self, key: &'a str, expires_in: Duration) -> StoreFuture<'a, String>;
}
