//! Client-credentials token issuance and bearer verification
//!
//! Tokens are opaque UUIDs persisted on the client's credential row; there is
//! no signature to check. The credential store is the source of truth:
//!
//! 1. `issue_token()` validates `client_id`/`client_secret` and overwrites the
//!    client's `access_token` with a fresh value
//! 2. `parse_bearer()` pulls the token out of an `Authorization` header
//! 3. `authorize()` accepts the token iff some credential row currently holds it
//!
//! Re-issuing a token for a client therefore revokes the previous one.

pub mod constants;
pub mod error;
pub mod gate;
pub mod issuer;

pub use constants::*;
pub use error::{Error, Result};
pub use gate::{authorize, parse_bearer};
pub use issuer::{TokenRequest, TokenResponse, issue_token};
