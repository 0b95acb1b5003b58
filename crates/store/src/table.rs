//! JSON-file key-value table
//!
//! Backs both the client credential table and the employee table. The file
//! holds a single JSON object mapping row key to row. All writes go through a
//! temp file + rename so a crash never leaves a half-written table, and a
//! tokio Mutex serializes concurrent writers (token issuance racing profile
//! uploads on different tables is fine; two writers on one table queue up).
//!
//! A table built with `in_memory()` or `from_rows()` never touches disk and is
//! what the router tests run against.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::types::{ClientCredential, EmployeeProfile};
use crate::{CredentialStore, ProfileStore, StoreFuture};

pub struct Table<V> {
    path: Option<PathBuf>,
    rows: Mutex<HashMap<String, V>>,
}

impl<V> Table<V>
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    /// Load the table from `path`.
    ///
    /// A missing file is created as `{}`, so a fresh deployment starts with an
    /// empty table instead of failing.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let rows = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::Io(format!("reading {}: {e}", path.display())))?;
            let rows: HashMap<String, V> = serde_json::from_str(&contents).map_err(|e| {
                StoreError::Serialization(format!("parsing {}: {e}", path.display()))
            })?;
            info!(path = %path.display(), rows = rows.len(), "loaded table");
            rows
        } else {
            info!(path = %path.display(), "table file not found, starting empty");
            let rows = HashMap::new();
            write_atomic(&path, &rows).await?;
            rows
        };

        Ok(Self {
            path: Some(path),
            rows: Mutex::new(rows),
        })
    }

    pub fn in_memory() -> Self {
        Self::from_rows(std::iter::empty())
    }

    /// Build an in-memory table pre-populated with `rows`.
    pub fn from_rows(rows: impl IntoIterator<Item = (String, V)>) -> Self {
        Self {
            path: None,
            rows: Mutex::new(rows.into_iter().collect()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let rows = self.rows.lock().await;
        rows.get(key).cloned()
    }

    /// Insert or replace a row and persist.
    ///
    /// On a failed write the previous in-memory row is restored.
    pub async fn upsert(&self, key: String, value: V) -> Result<()> {
        let mut rows = self.rows.lock().await;
        let previous = rows.insert(key.clone(), value);
        if let Err(e) = self.persist(&rows).await {
            match previous {
                Some(old) => rows.insert(key, old),
                None => rows.remove(&key),
            };
            return Err(e);
        }
        debug!(key, "upserted row");
        Ok(())
    }

    /// Apply `f` to an existing row and persist.
    ///
    /// Fails with `StoreError::NotFound` if the row does not exist.
    pub async fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut V) + Send,
    {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("row {key}")))?;
        let previous = row.clone();
        f(row);
        if let Err(e) = self.persist(&rows).await {
            rows.insert(key.to_owned(), previous);
            return Err(e);
        }
        debug!(key, "updated row");
        Ok(())
    }

    /// Keys of every row matching `predicate`.
    pub async fn scan<F>(&self, predicate: F) -> Vec<String>
    where
        F: Fn(&V) -> bool,
    {
        let rows = self.rows.lock().await;
        rows.iter()
            .filter(|&(_, row)| predicate(row))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, rows: &HashMap<String, V>) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, rows).await,
            None => Ok(()),
        }
    }
}

/// Write the table to `path` atomically with 0600 permissions.
///
/// The temp file name includes the target file name so two tables sharing a
/// directory never collide.
async fn write_atomic<V: Serialize>(path: &Path, rows: &HashMap<String, V>) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)
        .map_err(|e| StoreError::Serialization(format!("serializing table: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io("table path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("table");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| StoreError::Io(format!("writing temp table file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| StoreError::Io(format!("setting table file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::Io(format!("renaming temp table file: {e}")))?;

    debug!(path = %path.display(), "persisted table");
    Ok(())
}

impl CredentialStore for Table<ClientCredential> {
    fn get_credential<'a>(
        &'a self,
        client_id: &'a str,
    ) -> StoreFuture<'a, Option<ClientCredential>> {
        Box::pin(async move { Ok(self.get(client_id).await) })
    }

    fn set_access_token<'a>(&'a self, client_id: &'a str, token: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.update(client_id, |cred| cred.access_token = Some(token.to_owned()))
                .await
        })
    }

    fn scan_access_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            Ok(self
                .scan(|cred| cred.access_token.as_deref() == Some(token))
                .await)
        })
    }
}

impl ProfileStore for Table<EmployeeProfile> {
    fn put_profile(&self, profile: EmployeeProfile) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.upsert(profile.employee_id.clone(), profile).await })
    }

    fn get_profile<'a>(
        &'a self,
        employee_id: &'a str,
    ) -> StoreFuture<'a, Option<EmployeeProfile>> {
        Box::pin(async move { Ok(self.get(employee_id).await) })
    }
}
