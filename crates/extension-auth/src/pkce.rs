//! PKCE (Proof Key for Code Exchange) per RFC 7636, plus the anti-forgery
//! `state` value
//!
//! A fresh verifier is drawn for every sign-in attempt and dropped once the
//! token exchange finishes, whatever its outcome. The challenge goes into
//! the authorization URL; the verifier only ever travels to the token
//! endpoint.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use common::Secret;

/// Random bytes behind a verifier. Encodes to 43 characters, the RFC minimum.
const VERIFIER_BYTES: usize = 32;

/// Random bytes behind a `state` value (32 hex characters).
const STATE_BYTES: usize = 16;

/// Verifier/challenge pair for one authorization attempt.
#[derive(Debug)]
pub struct PkceParams {
    pub code_verifier: Secret<String>,
    pub code_challenge: String,
}

/// Draw a new verifier from the thread CSPRNG and derive its S256 challenge.
pub fn generate() -> PkceParams {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let code_challenge = compute_challenge(&verifier);
    PkceParams {
        code_verifier: Secret::new(verifier),
        code_challenge,
    }
}

/// `challenge = BASE64URL-NOPAD(SHA256(ASCII(verifier)))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque `state` for the authorization request: 16 random bytes, lowercase hex.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}
