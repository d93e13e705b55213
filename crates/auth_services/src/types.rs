use serde::{Deserialize, Serialize};

/// Claims carried by the marketplace's access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id
    pub sub: String,
    /// Expiry, seconds since the epoch
    pub exp: usize,
    /// Issued-at, seconds since the epoch
    pub iat: usize,
}

/// Errors produced while validating caller identity.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Token failed signature or expiry validation
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Token subject is not a valid user id
    #[error("Invalid token subject")]
    InvalidSubject,
}
