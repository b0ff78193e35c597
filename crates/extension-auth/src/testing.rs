//! Scripted capability doubles for unit tests

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use capability::{
    CapabilityError, HttpResponse, HttpTransport, IdentityLauncher, KeyValueStore,
    Result as CapResult, StorageMap,
};

use crate::clock::Clock;

/// Decides the redirect URL for the n-th launch (0-based) given the
/// authorization URL that was opened.
type Responder = Box<dyn Fn(usize, &str) -> Option<String> + Send + Sync>;

pub(crate) struct ScriptedIdentity {
    redirect_url: String,
    responder: Responder,
    delay: Duration,
    launched: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedIdentity {
    pub(crate) fn new(
        responder: impl Fn(usize, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            redirect_url: "https://ext.chromiumapp.org/".into(),
            responder: Box::new(responder),
            delay: Duration::ZERO,
            launched: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Always redirect back with `query` appended to the redirect URL.
    pub(crate) fn replying(query: &str) -> Self {
        let url = format!("https://ext.chromiumapp.org/?{query}");
        Self::new(move |_, _| Some(url.clone()))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    /// Highest number of flows that were open at the same time.
    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl IdentityLauncher for ScriptedIdentity {
    fn redirect_url(&self) -> Pin<Box<dyn Future<Output = CapResult<String>> + Send + '_>> {
        Box::pin(async move { Ok(self.redirect_url.clone()) })
    }

    fn launch_web_auth_flow<'a>(
        &'a self,
        authorization_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = CapResult<Option<String>>> + Send + 'a>> {
        Box::pin(async move {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);

            let index = {
                let mut launched = self.launched.lock().unwrap();
                launched.push(authorization_url.to_string());
                launched.len() - 1
            };
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok((self.responder)(index, authorization_url))
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl RecordedCall {
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub(crate) struct RecordingTransport {
    response: Option<HttpResponse>,
    delay: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTransport {
    pub(crate) fn respond(response: HttpResponse) -> Self {
        Self {
            response: Some(response),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ok(body: &str) -> Self {
        Self::respond(HttpResponse {
            status: 200,
            body: body.into(),
        })
    }

    /// Every call fails at the transport level.
    pub(crate) fn unreachable() -> Self {
        Self {
            response: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl HttpTransport for RecordingTransport {
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(&'a str, &'a str)],
    ) -> Pin<Box<dyn Future<Output = CapResult<HttpResponse>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(RecordedCall {
                url: url.to_string(),
                fields: fields
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            });
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response
                .clone()
                .ok_or_else(|| CapabilityError::Transport("connection refused".into()))
        })
    }
}

/// Storage area whose every call fails.
pub(crate) struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get<'a>(
        &'a self,
        _keys: &'a [&'a str],
    ) -> Pin<Box<dyn Future<Output = CapResult<StorageMap>> + Send + 'a>> {
        Box::pin(async { Err(CapabilityError::Storage("storage unavailable".into())) })
    }

    fn set(&self, _items: StorageMap) -> Pin<Box<dyn Future<Output = CapResult<()>> + Send + '_>> {
        Box::pin(async { Err(CapabilityError::Storage("storage unavailable".into())) })
    }

    fn remove<'a>(
        &'a self,
        _keys: &'a [&'a str],
    ) -> Pin<Box<dyn Future<Output = CapResult<()>> + Send + 'a>> {
        Box::pin(async { Err(CapabilityError::Storage("storage unavailable".into())) })
    }
}

/// Clock that only moves when told to.
pub(crate) struct ManualClock(AtomicU64);

impl ManualClock {
    pub(crate) fn at(millis: u64) -> Self {
        Self(AtomicU64::new(millis))
    }

    pub(crate) fn set(&self, millis: u64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
