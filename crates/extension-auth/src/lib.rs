//! OAuth 2.0 authorization code + PKCE sign-in for browser-extension hosts
//!
//! The host supplies three capabilities (see the `capability` crate): an
//! interactive web-auth launcher, a key/value storage area and an HTTP
//! transport. `Authenticator` drives the flow on top of them and answers
//! "who is signed in" queries from the stored record.
//!
//! Sign-in flow:
//! 1. Clear any stored record
//! 2. Ask the launcher for the redirect URL
//! 3. `pkce::generate()` + `pkce::generate_state()` for this attempt
//! 4. `authorize::build_authorization_url()` and launch it interactively
//! 5. `callback::parse_redirect()` the response for `code` / `error`
//! 6. `token::exchange_code()` with the code and verifier
//! 7. `claims::decode_unverified_claims()` on the id token for display
//! 8. `store::TokenStore::write()` the full record
//!
//! Refresh tokens are stored but never used: re-authentication always runs
//! the interactive flow. Id token signatures are never verified.

pub mod authenticator;
pub mod authorize;
pub mod callback;
pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
pub mod pkce;
pub mod store;
pub mod token;

#[cfg(test)]
mod testing;

pub use authenticator::{AuthState, Authenticator};
pub use claims::{UserProfile, decode_unverified_claims};
pub use clock::{Clock, SystemClock};
pub use config::{AuthConfig, CurrentUserPolicy, Endpoints};
pub use error::{Error, Result};
pub use pkce::{PkceParams, compute_challenge, generate_state};
pub use store::{StoredTokenRecord, TokenStore};
pub use token::{OAuthError, TokenResponse, exchange_code};
