//! Identity token claims, decoded WITHOUT signature verification
//!
//! The profile produced here is a display convenience. Nothing in this crate
//! checks the token's signature, issuer, audience or expiry, so the result
//! must never feed an authorization decision.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Signed-in user as shown in the UI. Derived from id token claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        rename = "userPrincipalName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_principal_name: Option<String>,
}

/// Claims read from the id token payload. Everything else is ignored.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    name: Option<String>,
    email: Option<String>,
    upn: Option<String>,
    preferred_username: Option<String>,
}

/// Decode the payload segment of `id_token` into a `UserProfile`.
///
/// `user_principal_name` falls back from `upn` to `preferred_username` to
/// `email`. The signature segment is not inspected.
pub fn decode_unverified_claims(id_token: &str) -> Result<UserProfile> {
    let segments: Vec<&str> = id_token.split('.').collect();
    if segments.len() != 3 {
        return Err(Error::MalformedIdToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let payload = to_standard_alphabet(segments[1]);
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| Error::MalformedIdToken(format!("payload is not base64: {e}")))?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedIdToken(format!("payload is not a claims object: {e}")))?;

    let user_principal_name = claims
        .upn
        .or(claims.preferred_username)
        .or_else(|| claims.email.clone());

    Ok(UserProfile {
        name: claims.name,
        email: claims.email,
        user_principal_name,
    })
}

/// Pad to a multiple of 4 and map the URL-safe alphabet back to standard.
fn to_standard_alphabet(segment: &str) -> String {
    let mut padded: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let remainder = padded.len() % 4;
    if remainder != 0 {
        padded.extend(std::iter::repeat_n('=', 4 - remainder));
    }
    padded
}
