//! Record types persisted in the key-value tables

use common::Secret;
use serde::{Deserialize, Serialize};

/// A pre-provisioned API client.
///
/// `access_token` holds the single currently valid bearer token, or `None`
/// when no token has been issued yet. Issuing a new token overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredential {
    pub client_id: String,
    pub client_secret: Secret<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl ClientCredential {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret.into()),
            access_token: None,
        }
    }
}

/// Employee profile row, keyed by `employee_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub start_date: String,
    pub country: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_without_token_column_deserializes() {
        let json = r#"{"client_id":"c1","client_secret":"s1"}"#;
        let cred: ClientCredential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.client_id, "c1");
        assert_eq!(cred.client_secret.expose(), "s1");
        assert!(cred.access_token.is_none());
    }

    #[test]
    fn credential_debug_hides_secret() {
        let cred = ClientCredential::new("c1", "super-secret");
        let debug = format!("{cred:?}");
        assert!(!debug.contains("super-secret"), "got: {debug}");
        assert!(debug.contains("c1"));
    }
}
