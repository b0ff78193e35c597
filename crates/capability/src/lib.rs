//! Capability seams between the sign-in core and its host platform
//!
//! The authenticator never talks to a browser, a disk or a socket directly.
//! It goes through three narrow traits:
//! - `IdentityLauncher` supplies the redirect URL and runs the interactive
//!   web-auth flow (a browser popup in an extension, a loopback listener in
//!   the native harness)
//! - `KeyValueStore` persists the token record as a flat JSON key set
//! - `HttpTransport` performs the single form POST to the token endpoint
//!
//! Methods return `Pin<Box<dyn Future>>` so the traits stay dyn-compatible
//! (`Arc<dyn KeyValueStore>`).

pub mod file;
pub mod memory;
pub mod transport;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use transport::ReqwestTransport;

use std::future::Future;
use std::pin::Pin;

/// Flat key/value map as exchanged with a storage area.
pub type StorageMap = serde_json::Map<String, serde_json::Value>;

/// Errors raised by a capability implementation.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("identity capability failed: {0}")]
    Identity(String),

    #[error("storage capability failed: {0}")]
    Storage(String),

    #[error("HTTP transport failed: {0}")]
    Transport(String),
}

/// Result alias for capability operations.
pub type Result<T> = std::result::Result<T, CapabilityError>;

/// Status and body text of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Interactive web-authentication launcher.
pub trait IdentityLauncher: Send + Sync {
    /// Redirect URL registered for this client. The provider sends the
    /// browser back here with `code`/`error` in the query.
    fn redirect_url(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Open `authorization_url` interactively and wait for the redirect.
    ///
    /// Resolves to the full redirect URL, or `None` when the user closed the
    /// surface or the flow otherwise produced no response.
    fn launch_web_auth_flow<'a>(
        &'a self,
        authorization_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;
}

/// Key/value storage area with batch get/set/remove.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the given keys. Missing keys are simply absent from the map.
    fn get<'a>(
        &'a self,
        keys: &'a [&'a str],
    ) -> Pin<Box<dyn Future<Output = Result<StorageMap>> + Send + 'a>>;

    /// Write every entry of `items` in one operation.
    fn set(&self, items: StorageMap) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Remove the given keys in one operation. Absent keys are ignored.
    fn remove<'a>(
        &'a self,
        keys: &'a [&'a str],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Outbound HTTP used for the token endpoint.
pub trait HttpTransport: Send + Sync {
    /// POST `fields` as `application/x-www-form-urlencoded` to `url`.
    ///
    /// Any status code is a successful exchange at this layer; only
    /// connection, timeout and body-read failures are errors.
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(&'a str, &'a str)],
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>>;
}
