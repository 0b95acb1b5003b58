//! Error types for token issuance and verification

use store::StoreError;

/// Errors from the token issuer and the auth gate.
///
/// Display strings are the client-facing detail messages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid grant type")]
    InvalidGrant,

    #[error("Invalid client_id or client_secret")]
    InvalidCredentials,

    #[error("Not authenticated")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0}")]
    Store(#[from] StoreError),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_underlying_message() {
        let err: Error = StoreError::Io("disk full".into()).into();
        assert_eq!(err.to_string(), "I/O error: disk full");
    }
}
