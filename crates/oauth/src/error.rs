/// Failure while building the consent URL or talking to the token endpoint.
///
/// Never retried. The caller surfaces it and the operator re-runs the grant.
#[derive(Debug, thiserror::Error)]
pub enum AuthExchangeError {
    #[error("invalid authorization request: {0}")]
    InvalidRequest(String),

    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl AuthExchangeError {
    /// The token endpoint refused the grant itself (revoked or expired
    /// refresh token, bad client), as opposed to being unreachable or down.
    pub fn is_grant_rejected(&self) -> bool {
        matches!(self, Self::Status { status: 400 | 401, .. })
    }
}

/// The credential store could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("credential database failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Anything that stops a protected call from getting a usable access token.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("missing OAuth 2.0 credentials")]
    NotAuthorized,

    #[error(transparent)]
    Exchange(#[from] AuthExchangeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
