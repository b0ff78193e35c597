//! Authorization request URL
//!
//! Percent-encodes with `%20` for spaces, so `openid profile` travels as
//! `openid%20profile`.

use url::Url;

use crate::error::{Error, Result};

/// Inputs to the authorize-endpoint URL for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub authorize_endpoint: &'a str,
    pub client_id: &'a str,
    /// Space-joined scopes
    pub scope: &'a str,
    pub redirect_uri: &'a str,
    pub state: &'a str,
    pub code_challenge: &'a str,
}

/// Build the authorization URL.
///
/// Parameter order: `client_id`, `response_type`, `redirect_uri`, `scope`,
/// `response_mode`, `state`, `code_challenge`, `code_challenge_method`.
pub fn build_authorization_url(request: &AuthorizationRequest<'_>) -> Result<String> {
    let base = Url::parse(request.authorize_endpoint).map_err(|e| {
        Error::Config(format!(
            "invalid authorize endpoint {}: {e}",
            request.authorize_endpoint
        ))
    })?;

    let separator = if base.query().is_some() { '&' } else { '?' };
    let params = [
        ("client_id", request.client_id),
        ("response_type", "code"),
        ("redirect_uri", request.redirect_uri),
        ("scope", request.scope),
        ("response_mode", "query"),
        ("state", request.state),
        ("code_challenge", request.code_challenge),
        ("code_challenge_method", "S256"),
    ];
    let query = params
        .iter()
        .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!("{}{separator}{query}", request.authorize_endpoint))
}
