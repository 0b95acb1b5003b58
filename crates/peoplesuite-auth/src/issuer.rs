//! Token endpoint logic for the client-credentials grant
//!
//! Validates the presented client id/secret against the credential store and
//! mints a fresh opaque token, replacing whatever token the client held
//! before. Concurrent issuance for one client is last-write-wins.

use common::Secret;
use serde::{Deserialize, Serialize};
use store::CredentialStore;
use tracing::{info, warn};

use crate::constants::{GRANT_TYPE_CLIENT_CREDENTIALS, TOKEN_TYPE_BEARER};
use crate::error::{Error, Result};

/// Form body of a token request.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Exchange client credentials for a new access token.
///
/// Fails with `InvalidGrant` for any grant type other than
/// `client_credentials`, and with `InvalidCredentials` when the client is
/// unknown or the secret does not match. Store failures pass through as
/// `Error::Store`.
pub async fn issue_token(
    store: &dyn CredentialStore,
    request: &TokenRequest,
) -> Result<TokenResponse> {
    if request.grant_type != GRANT_TYPE_CLIENT_CREDENTIALS {
        warn!(grant_type = %request.grant_type, "rejected token request with unsupported grant type");
        return Err(Error::InvalidGrant);
    }

    let credential = store.get_credential(&request.client_id).await?;
    let authenticated = credential.is_some_and(|cred| {
        cred.client_secret
            .matches(request.client_secret.expose().as_bytes())
    });
    if !authenticated {
        warn!(client_id = %request.client_id, "rejected token request with invalid client credentials");
        return Err(Error::InvalidCredentials);
    }

    let access_token = uuid::Uuid::new_v4().to_string();
    store
        .set_access_token(&request.client_id, &access_token)
        .await?;
    info!(client_id = %request.client_id, "issued access token");

    Ok(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE_BEARER.to_owned(),
    })
}
