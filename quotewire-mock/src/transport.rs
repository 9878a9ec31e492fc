//! Scripted fake HTTP transport for adapter tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quotewire_core::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync;

/// An [`HttpTransport`] that serves canned outcomes and records every request.
///
/// Two modes: a FIFO script of responses (`with_responses`/`push`), or a
/// routing closure (`from_fn`) for suites that need per-URL behavior. Like
/// the production transport, an already-cancelled token short-circuits
/// before the request is recorded.
pub struct FakeTransport {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    handler: Option<Box<Handler>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTransport {
    /// An empty transport; executing against it fails until responses are
    /// pushed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A transport that serves `responses` in order.
    #[must_use]
    pub fn with_responses(responses: Vec<HttpResponse>) -> Self {
        let transport = Self::new();
        {
            let mut script = transport.script.lock().expect("mutex poisoned");
            script.extend(responses.into_iter().map(Ok));
        }
        transport
    }

    /// A transport that routes every request through `handler`.
    pub fn from_fn(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            handler: Some(Box::new(handler)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response.
    pub fn push(&self, response: HttpResponse) {
        self.script
            .lock()
            .expect("mutex poisoned")
            .push_back(Ok(response));
    }

    /// Queue a transport-level failure.
    pub fn push_error(&self, error: HttpError) {
        self.script
            .lock()
            .expect("mutex poisoned")
            .push_back(Err(error));
    }

    /// Every request executed so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("mutex poisoned").clone()
    }

    /// Number of requests executed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.lock().expect("mutex poisoned").len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        request: HttpRequest,
    ) -> Result<HttpResponse, HttpError> {
        if cancel.is_cancelled() {
            return Err(HttpError::Cancelled);
        }
        self.requests
            .lock()
            .expect("mutex poisoned")
            .push(request.clone());
        if let Some(handler) = &self.handler {
            return handler(&request);
        }
        self.script
            .lock()
            .expect("mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(HttpError::Transport(
                    "fake transport has no scripted response left".to_string(),
                ))
            })
    }
}
