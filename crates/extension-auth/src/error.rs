//! Error types for sign-in operations

use capability::CapabilityError;

/// Errors surfaced by `Authenticator` construction and its active actions
/// (`authenticate`, `sign_out`). Query paths never return these.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("web auth flow returned no response URL")]
    FlowCancelled,

    #[error("OAuth error: {0}")]
    ProviderError(String),

    #[error("no authorization code received")]
    NoAuthorizationCode,

    #[error("redirect URL could not be parsed: {0}")]
    InvalidRedirect(String),

    #[error("state returned in redirect does not match the request")]
    StateMismatch,

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("malformed id token: {0}")]
    MalformedIdToken(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("identity capability error: {0}")]
    Identity(String),
}

/// Result alias for sign-in operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<CapabilityError> for Error {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::Identity(msg) => Error::Identity(msg),
            CapabilityError::Storage(msg) => Error::Storage(msg),
            CapabilityError::Transport(msg) => Error::Http(msg),
        }
    }
}

impl From<common::Error> for Error {
    fn from(err: common::Error) -> Self {
        Error::Config(err.to_string())
    }
}
