//! Sign-in state machine
//!
//! `SignedOut → Authenticating → Authenticated`, with `Authenticated`
//! decaying to `Expired` purely by wall clock. Nothing is scheduled: expiry
//! is evaluated whenever a query reads the stored record.
//!
//! Each `authenticate()` call builds its own `FlowSession` (redirect URL,
//! PKCE pair, state) and drops it when the attempt ends. A per-instance
//! single-flight lock additionally serializes attempts, so two concurrent
//! calls can never interleave their verifiers or overwrite each other's
//! record mid-flight. Queries do not take the lock.
//!
//! `sign_out()` wins over an attempt already in flight: it bumps a sign-out
//! counter under the record lock, and an attempt that sees the counter move
//! discards its tokens and fails with `FlowCancelled` instead of writing.
//!
//! Error policy: construction, `authenticate()` and `sign_out()` return
//! errors. `access_token()`, `is_authenticated()` and `current_user()` never
//! do; storage failures there are logged and read as "signed out".

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use capability::{HttpTransport, IdentityLauncher, KeyValueStore};

use crate::authorize::{AuthorizationRequest, build_authorization_url};
use crate::callback::parse_redirect;
use crate::claims::{UserProfile, decode_unverified_claims};
use crate::clock::{Clock, SystemClock};
use crate::config::{AuthConfig, CurrentUserPolicy, Endpoints};
use crate::error::{Error, Result};
use crate::pkce::{self, PkceParams};
use crate::store::{StoredTokenRecord, TokenStore};
use crate::token::{CodeExchange, TokenResponse, exchange_code};

/// Observable sign-in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    Authenticating,
    Authenticated,
    Expired,
}

/// Ephemeral data for exactly one authorization attempt. Never persisted.
#[derive(Debug)]
struct FlowSession {
    redirect_url: String,
    pkce: PkceParams,
    state: String,
}

impl FlowSession {
    fn begin(redirect_url: String) -> Self {
        Self {
            redirect_url,
            pkce: pkce::generate(),
            state: pkce::generate_state(),
        }
    }
}

pub struct Authenticator {
    config: AuthConfig,
    endpoints: Endpoints,
    scope: String,
    identity: Arc<dyn IdentityLauncher>,
    transport: Arc<dyn HttpTransport>,
    store: TokenStore,
    clock: Arc<dyn Clock>,
    signin_lock: Mutex<()>,
    /// Held while the stored record is written or cleared.
    record_lock: Mutex<()>,
    signouts: AtomicU64,
}

impl Authenticator {
    /// Validate `config` and wire the capabilities.
    ///
    /// Missing or blank `client_id`, `scopes` or `authority` fail here with
    /// `Error::Config`, never later at call time.
    pub fn new(
        config: AuthConfig,
        identity: Arc<dyn IdentityLauncher>,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let endpoints = config.validate()?;
        let scope = config.scope_string();
        debug!(
            authorize = %endpoints.authorize,
            token = %endpoints.token,
            scope = %scope,
            "authenticator configured"
        );
        Ok(Self {
            config,
            endpoints,
            scope,
            identity,
            transport,
            store: TokenStore::new(storage),
            clock: Arc::new(SystemClock),
            signin_lock: Mutex::new(()),
            record_lock: Mutex::new(()),
            signouts: AtomicU64::new(0),
        })
    }

    /// Replace the wall clock used for expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the full interactive sign-in and persist the resulting tokens.
    ///
    /// Any existing record is cleared first. On failure nothing is stored,
    /// leaving the user signed out.
    pub async fn authenticate(&self) -> Result<TokenResponse> {
        let _flight = self.signin_lock.lock().await;
        info!("starting interactive sign-in");
        let signouts_at_start = self.signouts.load(Ordering::SeqCst);

        self.store.clear().await?;

        let redirect_url = self.identity.redirect_url().await?;
        let session = FlowSession::begin(redirect_url);

        let authorization_url = build_authorization_url(&AuthorizationRequest {
            authorize_endpoint: &self.endpoints.authorize,
            client_id: &self.config.client_id,
            scope: &self.scope,
            redirect_uri: &session.redirect_url,
            state: &session.state,
            code_challenge: &session.pkce.code_challenge,
        })?;

        let response_url = match self
            .identity
            .launch_web_auth_flow(&authorization_url)
            .await?
        {
            Some(url) if !url.trim().is_empty() => url,
            _ => {
                info!("web auth flow closed without a response");
                return Err(Error::FlowCancelled);
            }
        };

        if self.signed_out_since(signouts_at_start) {
            info!("signed out while the web auth flow was open");
            return Err(Error::FlowCancelled);
        }

        let redirect = parse_redirect(&response_url)?;
        if let Some(error) = redirect.error {
            warn!(
                error = %error,
                description = redirect.error_description.as_deref().unwrap_or(""),
                "provider rejected sign-in"
            );
            return Err(Error::ProviderError(error));
        }
        if self.config.verify_state && redirect.state.as_deref() != Some(session.state.as_str()) {
            warn!("redirect state does not match the authorization request");
            return Err(Error::StateMismatch);
        }
        let code = redirect.code.ok_or(Error::NoAuthorizationCode)?;
        debug!("received authorization code");

        let exchanged = exchange_code(
            self.transport.as_ref(),
            &CodeExchange {
                token_endpoint: &self.endpoints.token,
                client_id: &self.config.client_id,
                scope: &self.scope,
                code: &code,
                redirect_uri: &session.redirect_url,
                code_verifier: session.pkce.code_verifier.as_str(),
            },
        )
        .await;
        // The verifier is single-use whatever the outcome.
        drop(session);
        let mut token = exchanged?;

        if let Some(id_token) = token.id_token.as_deref().filter(|t| !t.trim().is_empty()) {
            token.user_profile = Some(decode_unverified_claims(id_token)?);
        }

        let record = StoredTokenRecord::from_response(&token, self.clock.now_millis());
        {
            let _record = self.record_lock.lock().await;
            if self.signed_out_since(signouts_at_start) {
                info!("signed out during token exchange, discarding tokens");
                return Err(Error::FlowCancelled);
            }
            self.store.write(&record).await?;
        }

        info!(
            expires_at = ?record.expires_at,
            user = token
                .user_profile
                .as_ref()
                .and_then(|p| p.user_principal_name.as_deref())
                .unwrap_or(""),
            "sign-in complete"
        );
        Ok(token)
    }

    /// Clear the stored record. Idempotent.
    ///
    /// Does not wait for an in-flight `authenticate()`, but cancels it: that
    /// attempt fails with `FlowCancelled` and never writes its tokens.
    pub async fn sign_out(&self) -> Result<()> {
        info!("signing out");
        let _record = self.record_lock.lock().await;
        self.signouts.fetch_add(1, Ordering::SeqCst);
        self.store.clear().await
    }

    fn signed_out_since(&self, signouts_at_start: u64) -> bool {
        self.signouts.load(Ordering::SeqCst) != signouts_at_start
    }

    /// Whether a non-expired access token is stored.
    pub async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// Stored access token, if present and not expired.
    ///
    /// `expires_at == now` counts as expired.
    pub async fn access_token(&self) -> Option<String> {
        let record = self.read_record().await?;
        let now = self.clock.now_millis();
        match record.usable_access_token(now) {
            Some(token) => Some(token.to_string()),
            None => {
                if record.access_token.is_none() {
                    info!("access token is not available");
                } else {
                    info!(expires_at = ?record.expires_at, "access token has expired or is invalid");
                }
                None
            }
        }
    }

    /// Profile of the signed-in user.
    ///
    /// Without a valid token this returns `None` under
    /// `CurrentUserPolicy::NoPrompt`, or runs `authenticate()` first under
    /// `CurrentUserPolicy::Authenticate` (a failed sign-in also yields
    /// `None`). The profile comes from unverified id token claims.
    pub async fn current_user(&self) -> Option<UserProfile> {
        if self.access_token().await.is_none() {
            match self.config.current_user_policy {
                CurrentUserPolicy::NoPrompt => return None,
                CurrentUserPolicy::Authenticate => {
                    if let Err(e) = self.authenticate().await {
                        warn!(error = %e, "sign-in for current user failed");
                        return None;
                    }
                }
            }
        }

        self.read_record().await?.user_profile
    }

    /// Current state, derived lazily from the lock and the stored record.
    pub async fn state(&self) -> AuthState {
        if self.signin_lock.try_lock().is_err() {
            return AuthState::Authenticating;
        }
        let Some(record) = self.read_record().await else {
            return AuthState::SignedOut;
        };
        if record.access_token.is_none() || record.expires_at.is_none() {
            return AuthState::SignedOut;
        }
        if record.usable_access_token(self.clock.now_millis()).is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Expired
        }
    }

    async fn read_record(&self) -> Option<StoredTokenRecord> {
        match self.store.read().await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "could not read token record, treating as signed out");
                None
            }
        }
    }
}
