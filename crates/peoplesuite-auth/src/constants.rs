//! OAuth2 client-credentials protocol constants

/// The only `grant_type` the token endpoint accepts
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";

/// `token_type` returned alongside every issued token
pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// Authorization scheme expected on protected requests (matched case-insensitively)
pub const BEARER_SCHEME: &str = "Bearer";
