//! Authorization code exchange
//!
//! One form POST to the token endpoint per sign-in attempt. There is no
//! retry and no refresh grant: the refresh token is persisted but every
//! re-authentication runs the interactive flow again.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use capability::HttpTransport;

use crate::claims::UserProfile;
use crate::error::{Error, Result};

/// Token endpoint success body.
///
/// `expires_in` is a delta in seconds from the response time. The store
/// converts it to an absolute millisecond timestamp.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token_type: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub expires_in: u64,
    /// Filled in from `id_token` after the exchange, never by the provider.
    #[serde(
        rename = "userProfile",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_profile: Option<UserProfile>,
}

/// Token endpoint error body (RFC 6749 §5.2).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuthError {
    /// Description when the provider sent one, otherwise the error code.
    pub fn message(&self) -> &str {
        self.error_description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&self.error)
    }
}

/// Parameters of an `authorization_code` grant.
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub token_endpoint: &'a str,
    pub client_id: &'a str,
    /// Space-joined scopes
    pub scope: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub code_verifier: &'a str,
}

/// Exchange an authorization code and PKCE verifier for tokens.
///
/// The response is returned unchanged; profile decoration is the caller's
/// job.
pub async fn exchange_code(
    transport: &dyn HttpTransport,
    exchange: &CodeExchange<'_>,
) -> Result<TokenResponse> {
    let fields = [
        ("client_id", exchange.client_id),
        ("scope", exchange.scope),
        ("code", exchange.code),
        ("redirect_uri", exchange.redirect_uri),
        ("grant_type", "authorization_code"),
        ("code_verifier", exchange.code_verifier),
    ];

    let response = transport
        .post_form(exchange.token_endpoint, &fields)
        .await?;

    if !response.is_success() {
        let message = match serde_json::from_str::<OAuthError>(&response.body) {
            Ok(err) => err.message().to_string(),
            Err(_) => format!(
                "token endpoint returned {}: {}",
                response.status, response.body
            ),
        };
        warn!(status = response.status, error = %message, "token exchange rejected");
        return Err(Error::TokenExchangeFailed(message));
    }

    let token: TokenResponse = serde_json::from_str(&response.body)
        .map_err(|e| Error::TokenExchangeFailed(format!("invalid token response: {e}")))?;
    debug!(
        token_type = %token.token_type,
        expires_in = token.expires_in,
        has_refresh_token = token.refresh_token.is_some(),
        has_id_token = token.id_token.is_some(),
        "token exchange succeeded"
    );
    Ok(token)
}
