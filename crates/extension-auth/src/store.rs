//! Persisted token record
//!
//! The record is six flat keys in the host storage area. They are always
//! written together (absent values as JSON `null`) and removed together, so
//! a reader never sees a mix of two sign-ins. A reader still tolerates any
//! key being missing or of the wrong type and reports it as `None`; callers
//! treat an incomplete record as signed out.
//!
//! `expiresAt` is absolute unix milliseconds, computed when the token is
//! captured as `now + expires_in * 1000`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use capability::{KeyValueStore, StorageMap};

use crate::claims::UserProfile;
use crate::error::Result;
use crate::token::TokenResponse;

pub const TOKEN_TYPE_KEY: &str = "tokenType";
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const EXPIRES_AT_KEY: &str = "expiresAt";
pub const ID_TOKEN_KEY: &str = "idToken";
pub const USER_PROFILE_KEY: &str = "userProfile";

/// Every key of the record, in write order.
pub const RECORD_KEYS: [&str; 6] = [
    TOKEN_TYPE_KEY,
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    EXPIRES_AT_KEY,
    ID_TOKEN_KEY,
    USER_PROFILE_KEY,
];

/// Token record as stored. Every field may be absent on read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredTokenRecord {
    pub token_type: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix milliseconds
    pub expires_at: Option<u64>,
    pub id_token: Option<String>,
    pub user_profile: Option<UserProfile>,
}

impl StoredTokenRecord {
    /// Build the record for `token` captured at `captured_at_ms`.
    pub fn from_response(token: &TokenResponse, captured_at_ms: u64) -> Self {
        let expires_at = captured_at_ms.saturating_add(token.expires_in.saturating_mul(1000));
        Self {
            token_type: Some(token.token_type.clone()),
            access_token: Some(token.access_token.clone()),
            refresh_token: token.refresh_token.clone(),
            expires_at: Some(expires_at),
            id_token: token.id_token.clone(),
            user_profile: token.user_profile.clone(),
        }
    }

    /// The access token if it is present, non-blank and `expires_at > now_ms`.
    ///
    /// A token without an expiry is not usable: an unknown expiry never
    /// counts as authenticated.
    pub fn usable_access_token(&self, now_ms: u64) -> Option<&str> {
        let token = self.access_token.as_deref().filter(|t| !t.trim().is_empty())?;
        let expires_at = self.expires_at?;
        (expires_at > now_ms).then_some(token)
    }
}

/// Reads and writes `StoredTokenRecord` through a `KeyValueStore`.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Replace the whole record in one storage call.
    pub async fn write(&self, record: &StoredTokenRecord) -> Result<()> {
        let profile = match &record.user_profile {
            Some(profile) => serde_json::to_value(profile).unwrap_or(Value::Null),
            None => Value::Null,
        };

        let mut items = StorageMap::new();
        items.insert(TOKEN_TYPE_KEY.into(), opt_string(&record.token_type));
        items.insert(ACCESS_TOKEN_KEY.into(), opt_string(&record.access_token));
        items.insert(REFRESH_TOKEN_KEY.into(), opt_string(&record.refresh_token));
        items.insert(
            EXPIRES_AT_KEY.into(),
            record.expires_at.map(Value::from).unwrap_or(Value::Null),
        );
        items.insert(ID_TOKEN_KEY.into(), opt_string(&record.id_token));
        items.insert(USER_PROFILE_KEY.into(), profile);

        self.storage.set(items).await?;
        debug!(expires_at = ?record.expires_at, "stored token record");
        Ok(())
    }

    /// Read whatever part of the record is present.
    pub async fn read(&self) -> Result<StoredTokenRecord> {
        let items = self.storage.get(&RECORD_KEYS).await?;

        let user_profile = match items.get(USER_PROFILE_KEY) {
            Some(Value::Null) | None => None,
            Some(value) => match serde_json::from_value::<UserProfile>(value.clone()) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    debug!(error = %e, "stored user profile is malformed, ignoring");
                    None
                }
            },
        };

        Ok(StoredTokenRecord {
            token_type: string_at(&items, TOKEN_TYPE_KEY),
            access_token: string_at(&items, ACCESS_TOKEN_KEY),
            refresh_token: string_at(&items, REFRESH_TOKEN_KEY),
            expires_at: millis_at(&items, EXPIRES_AT_KEY),
            id_token: string_at(&items, ID_TOKEN_KEY),
            user_profile,
        })
    }

    /// Remove every record key. Clearing an empty record is a no-op.
    pub async fn clear(&self) -> Result<()> {
        self.storage.remove(&RECORD_KEYS).await?;
        debug!("cleared token record");
        Ok(())
    }
}

fn opt_string(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn string_at(items: &StorageMap, key: &str) -> Option<String> {
    items.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Expiry as a JSON number, or the decimal string older writers used.
fn millis_at(items: &StorageMap, key: &str) -> Option<u64> {
    match items.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
