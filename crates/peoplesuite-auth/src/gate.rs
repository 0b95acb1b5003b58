//! Bearer token verification
//!
//! A set-membership check against the credential store, run before every
//! protected handler. Read-only: verifying a token never mutates the store.

use store::CredentialStore;
use tracing::debug;

use crate::constants::BEARER_SCHEME;
use crate::error::{Error, Result};

/// Extract the token from an `Authorization` header value.
///
/// Fails with `MissingToken` when the header is absent, uses another scheme,
/// or carries an empty token.
pub fn parse_bearer(header: Option<&str>) -> Result<&str> {
    let value = header.ok_or(Error::MissingToken)?;
    let (scheme, token) = value.trim().split_once(' ').ok_or(Error::MissingToken)?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(Error::MissingToken);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::MissingToken);
    }
    Ok(token)
}

/// Accept `token` iff at least one credential row currently holds it.
pub async fn authorize(store: &dyn CredentialStore, token: &str) -> Result<()> {
    let holders = store.scan_access_token(token).await?;
    if holders.is_empty() {
        return Err(Error::InvalidToken);
    }
    debug!(client_id = %holders[0], "bearer token accepted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::{TokenRequest, issue_token};
    use common::Secret;
    use store::{ClientCredential, Table};

    #[test]
    fn parse_bearer_extracts_token() {
        assert_eq!(parse_bearer(Some("Bearer abc-123")).unwrap(), "abc-123");
        assert_eq!(parse_bearer(Some("bearer abc-123")).unwrap(), "abc-123");
        assert_eq!(parse_bearer(Some("  Bearer   abc-123 ")).unwrap(), "abc-123");
    }

    #[test]
    fn parse_bearer_rejects_missing_or_malformed_headers() {
        for header in [None, Some(""), Some("Bearer"), Some("Bearer   "), Some("Basic dXNlcjpwYXNz")] {
            let err = parse_bearer(header).unwrap_err();
            assert!(matches!(err, Error::MissingToken), "{header:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let store = Table::from_rows([("c1".to_string(), ClientCredential::new("c1", "s1"))]);
        let err = authorize(&store, "not-issued").await.unwrap_err();
        assert!(matches!(err, Error::InvalidToken), "got: {err:?}");
    }

    #[tokio::test]
    async fn issued_token_is_accepted_until_reissued() {
        let store = Table::from_rows([("c1".to_string(), ClientCredential::new("c1", "s1"))]);
        let request = TokenRequest {
            grant_type: "client_credentials".into(),
            client_id: "c1".into(),
            client_secret: Secret::new("s1".into()),
        };

        let old = issue_token(&store, &request).await.unwrap().access_token;
        authorize(&store, &old).await.unwrap();

        let new = issue_token(&store, &request).await.unwrap().access_token;
        authorize(&store, &new).await.unwrap();
        let err = authorize(&store, &old).await.unwrap_err();
        assert!(matches!(err, Error::InvalidToken), "got: {err:?}");
    }

    #[tokio::test]
    async fn tokens_of_other_clients_stay_valid() {
        let store = Table::from_rows([
            ("c1".to_string(), ClientCredential::new("c1", "s1")),
            ("c2".to_string(), ClientCredential::new("c2", "s2")),
        ]);
        store.set_access_token("c1", "tok-c1").await.unwrap();
        store.set_access_token("c2", "tok-c2").await.unwrap();
        store.set_access_token("c2", "tok-c2-new").await.unwrap();

        authorize(&store, "tok-c1").await.unwrap();
        assert!(authorize(&store, "tok-c2").await.is_err());
    }
}
