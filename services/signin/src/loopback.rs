//! Browser sign-in over a loopback redirect listener
//!
//! Stands in for the extension host's web-auth-flow API: prints the
//! authorization URL, then waits for the identity provider to redirect the
//! browser back to `http://localhost:<port>/callback`.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::response::Html;
use axum::routing::get;
use capability::{CapabilityError, IdentityLauncher};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

const CALLBACK_PATH: &str = "/callback";

/// Redirect-capture state shared with the callback handler.
#[derive(Clone)]
struct CallbackState {
    redirect_base: String,
    sender: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

/// Identity launcher backed by a short-lived local HTTP listener
pub struct LoopbackIdentity {
    port: u16,
    wait: Option<Duration>,
}

impl LoopbackIdentity {
    pub fn new(port: u16, wait: Option<Duration>) -> Self {
        Self { port, wait }
    }

    fn redirect_base(&self) -> String {
        format!("http://localhost:{}{}", self.port, CALLBACK_PATH)
    }

    async fn run_flow(&self, authorization_url: &str) -> capability::Result<Option<String>> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            CapabilityError::Identity(format!("failed to bind redirect listener on {addr}: {e}"))
        })?;

        let (tx, rx) = oneshot::channel();
        let state = CallbackState {
            redirect_base: self.redirect_base(),
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        let router = Router::new()
            .route(CALLBACK_PATH, get(callback_handler))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(addr = %addr, "waiting for browser redirect");
        eprintln!("Open this URL in a browser to sign in:\n\n  {authorization_url}\n");

        let outcome = tokio::select! {
            redirect = rx => redirect.ok(),
            _ = tokio::signal::ctrl_c() => {
                warn!("sign-in interrupted");
                None
            }
            _ = wait_or_forever(self.wait) => {
                warn!(wait_secs = self.wait.map(|w| w.as_secs()).unwrap_or_default(), "gave up waiting for browser redirect");
                None
            }
        };

        let _ = shutdown_tx.send(());
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "redirect listener error"),
            Err(e) => warn!(error = %e, "redirect listener task failed"),
        }

        Ok(outcome)
    }
}

async fn wait_or_forever(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

/// Hands the full redirect URL (with query) back to the waiting flow.
async fn callback_handler(
    State(state): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> Html<&'static str> {
    let url = match query {
        Some(q) if !q.is_empty() => format!("{}?{}", state.redirect_base, q),
        _ => state.redirect_base.clone(),
    };

    match state.sender.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(url);
            Html("<html><body>Sign-in complete. You can close this window.</body></html>")
        }
        None => Html("<html><body>Sign-in already handled.</body></html>"),
    }
}

impl IdentityLauncher for LoopbackIdentity {
    fn redirect_url(
        &self,
    ) -> Pin<Box<dyn Future<Output = capability::Result<String>> + Send + '_>> {
        let url = self.redirect_base();
        Box::pin(async move { Ok(url) })
    }

    fn launch_web_auth_flow<'a>(
        &'a self,
        authorization_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = capability::Result<Option<String>>> + Send + 'a>> {
        Box::pin(self.run_flow(authorization_url))
    }
}
