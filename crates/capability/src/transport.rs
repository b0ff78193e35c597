//! reqwest-backed token endpoint transport
//!
//! Every request carries a bounded timeout. The interactive part of sign-in
//! can wait on the user indefinitely, but the token exchange must not.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::{CapabilityError, HttpResponse, HttpTransport, Result};

pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport with its own client.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CapabilityError::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(&'a str, &'a str)],
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(url)
                .timeout(self.timeout)
                .form(&fields)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        CapabilityError::Transport(format!(
                            "POST {url} timed out after {}s",
                            self.timeout.as_secs_f32()
                        ))
                    } else {
                        CapabilityError::Transport(format!("POST {url} failed: {e}"))
                    }
                })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| CapabilityError::Transport(format!("reading response body: {e}")))?;

            debug!(url, status, "token endpoint responded");
            Ok(HttpResponse { status, body })
        })
    }
}
