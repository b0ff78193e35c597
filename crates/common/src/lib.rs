//! Types shared by the extension-auth crates and the sign-in harness

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
