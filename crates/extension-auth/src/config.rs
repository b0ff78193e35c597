//! Client configuration and endpoint derivation
//!
//! `client_id`, `scopes` and `authority` are required. Every field
//! deserializes with a default so that a missing key surfaces as
//! `MissingSetting` from `validate()` at construction time rather than as a
//! parse error somewhere else.

use serde::Deserialize;

use common::Error as ConfigError;

/// Default bound on the token exchange HTTP call.
const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 30;

/// What `current_user()` does when no valid access token is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum CurrentUserPolicy {
    /// Return `None` without prompting.
    #[default]
    #[serde(rename = "none")]
    NoPrompt,
    /// Run the interactive sign-in first.
    #[serde(rename = "authenticate")]
    Authenticate,
}

/// OAuth client settings (`[auth]` table in the harness config).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Base URL, e.g. `https://login.microsoftonline.com/common`
    #[serde(default)]
    pub authority: String,
    #[serde(default = "default_token_timeout")]
    pub token_timeout_secs: u64,
    /// Compare the `state` returned in the redirect against the one sent.
    #[serde(default)]
    pub verify_state: bool,
    #[serde(default)]
    pub current_user_policy: CurrentUserPolicy,
}

fn default_token_timeout() -> u64 {
    DEFAULT_TOKEN_TIMEOUT_SECS
}

/// Authorize and token endpoints derived from the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
}

impl AuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            authority: authority.into(),
            token_timeout_secs: DEFAULT_TOKEN_TIMEOUT_SECS,
            verify_state: false,
            current_user_policy: CurrentUserPolicy::default(),
        }
    }

    /// Check required settings and derive the endpoints.
    pub fn validate(&self) -> common::Result<Endpoints> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingSetting("client_id"));
        }
        if self.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::MissingSetting("scopes"));
        }
        let authority = self.authority.trim().trim_end_matches('/');
        if authority.is_empty() {
            return Err(ConfigError::MissingSetting("authority"));
        }
        if !authority.starts_with("http://") && !authority.starts_with("https://") {
            return Err(ConfigError::Config(format!(
                "authority must start with http:// or https://, got: {authority}"
            )));
        }
        if self.token_timeout_secs == 0 {
            return Err(ConfigError::Config(
                "token_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(Endpoints {
            authorize: format!("{authority}/oauth2/v2.0/authorize"),
            token: format!("{authority}/oauth2/v2.0/token"),
        })
    }

    /// Scopes joined by single spaces, blanks dropped.
    pub fn scope_string(&self) -> String {
        self.scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthConfig {
        AuthConfig::new(
            "11111111-2222-3333-4444-555555555555",
            ["openid", "profile"],
            "https://login.microsoftonline.com/common",
        )
    }

    #[test]
    fn endpoints_follow_v2_layout() {
        let endpoints = valid().validate().unwrap();
        assert_eq!(
            endpoints.authorize,
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
        );
        assert_eq!(
            endpoints.token,
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
    }

    #[test]
    fn trailing_slash_on_authority_is_trimmed() {
        let mut config = valid();
        config.authority = "https://login.example.com/tenant/".into();
        let endpoints = config.validate().unwrap();
        assert_eq!(
            endpoints.token,
            "https://login.example.com/tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn scopes_join_with_single_space() {
        assert_eq!(valid().scope_string(), "openid profile");
    }

    #[test]
    fn missing_client_id_rejected() {
        let mut config = valid();
        config.client_id = "   ".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting("client_id")));
    }

    #[test]
    fn missing_scopes_rejected() {
        let mut config = valid();
        config.scopes.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting("scopes")));
    }

    #[test]
    fn missing_authority_rejected() {
        let mut config = valid();
        config.authority = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting("authority")));
    }

    #[test]
    fn authority_without_scheme_rejected() {
        let mut config = valid();
        config.authority = "login.microsoftonline.com/common".into();
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("authority must start with http"),
            "got: {err}"
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = valid();
        config.token_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: AuthConfig = serde_json::from_str(
            r#"{"client_id":"abc","scopes":["openid"],"authority":"https://idp"}"#,
        )
        .unwrap();
        assert_eq!(config.token_timeout_secs, 30);
        assert!(!config.verify_state);
        assert_eq!(config.current_user_policy, CurrentUserPolicy::NoPrompt);
    }

    #[test]
    fn policy_deserializes_from_lowercase_names() {
        let config: AuthConfig = serde_json::from_str(
            r#"{"client_id":"abc","scopes":["openid"],"authority":"https://idp","current_user_policy":"authenticate"}"#,
        )
        .unwrap();
        assert_eq!(config.current_user_policy, CurrentUserPolicy::Authenticate);
    }

    #[test]
    fn absent_required_fields_fail_validation_not_parsing() {
        let config: AuthConfig = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSetting("client_id"))
        ));
    }
}
