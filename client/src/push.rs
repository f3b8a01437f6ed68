//! The push-channel collaborator and its server-sent-events implementation.

use std::str;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap};
use thiserror::Error;
use tokio::task::{self, JoinHandle};
use tokio::time;

use crate::retry::{Backoff, BackoffConfig};
use crate::sse::{MAX_SSE_BUFFER_BYTES, drain_next_sse_event, parse_sse_frame};
use crate::transport::read_capped_error_body;

/// One named event delivered over a push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub name: String,
    pub data: String,
    /// Last event id seen on the stream, if the server sends ids.
    pub id: Option<String>,
}

impl PushEvent {
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// Why a push connection dropped. The channel reconnects after reporting one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("push channel returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("push stream failed: {0}")]
    Stream(String),
    #[error("push stream carried invalid UTF-8")]
    InvalidUtf8,
    #[error("push event exceeded the 4 MiB buffer limit")]
    BufferOverflow,
    #[error("push stream closed by server")]
    Closed,
}

/// Callbacks a subscription reports to.
pub struct PushHandlers {
    pub on_event: Box<dyn FnMut(PushEvent)>,
    pub on_error: Box<dyn FnMut(PushError)>,
}

impl PushHandlers {
    pub fn new(
        on_event: impl FnMut(PushEvent) + 'static,
        on_error: impl FnMut(PushError) + 'static,
    ) -> Self {
        Self {
            on_event: Box::new(on_event),
            on_error: Box::new(on_error),
        }
    }
}

/// A source of named events for a path.
pub trait PushChannel {
    /// Start delivering events for `path` to `handlers` until the returned
    /// [`Subscription`] is dropped.
    fn subscribe(&self, path: &str, handlers: PushHandlers) -> Subscription;
}

/// Keeps a push subscription alive. Dropping it stops delivery.
#[derive(Debug, Default)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// A subscription backed by a spawned task, aborted on drop.
    #[must_use]
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A subscription with nothing to tear down.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// [`PushChannel`] over a long-lived `text/event-stream` response.
///
/// `subscribe` spawns the reader on the current `LocalSet`; handlers run on
/// that task. A dropped connection is reported through `on_error` and retried
/// with backoff. The event id from the stream is replayed as `Last-Event-ID`.
#[derive(Debug, Clone)]
pub struct SseChannel {
    http: reqwest::Client,
    origin: String,
    backoff: BackoffConfig,
}

impl SseChannel {
    #[must_use]
    pub fn new(http: reqwest::Client, origin: impl Into<String>) -> Self {
        Self {
            http,
            origin: origin.into(),
            backoff: BackoffConfig::default(),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    fn url_for(&self, path: &str) -> String {
        let origin = self.origin.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{origin}{path}")
        } else {
            format!("{origin}/{path}")
        }
    }
}

impl PushChannel for SseChannel {
    fn subscribe(&self, path: &str, handlers: PushHandlers) -> Subscription {
        let stream = EventStream {
            http: self.http.clone(),
            url: self.url_for(path),
            backoff: Backoff::new(self.backoff.clone()),
            last_event_id: None,
        };
        Subscription::from_task(task::spawn_local(stream.run(handlers)))
    }
}

struct EventStream {
    http: reqwest::Client,
    url: String,
    backoff: Backoff,
    last_event_id: Option<String>,
}

/// How one connection ended.
struct Disconnect {
    error: PushError,
    headers: Option<HeaderMap>,
}

impl From<PushError> for Disconnect {
    fn from(error: PushError) -> Self {
        Self {
            error,
            headers: None,
        }
    }
}

impl EventStream {
    async fn run(mut self, mut handlers: PushHandlers) {
        loop {
            let disconnect = self.connect_once(&mut handlers).await;
            let delay = self.backoff.next_delay(disconnect.headers.as_ref());
            tracing::warn!(
                url = %self.url,
                error = %disconnect.error,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Push channel disconnected; reconnecting"
            );
            (handlers.on_error)(disconnect.error);
            time::sleep(delay).await;
        }
    }

    async fn connect_once(&mut self, handlers: &mut PushHandlers) -> Disconnect {
        let mut request = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = &self.last_event_id {
            request = request.header("Last-Event-ID", id);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return PushError::Connect(e.to_string()).into(),
        };

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = read_capped_error_body(response).await;
            return Disconnect {
                error: PushError::Status {
                    status: status.as_u16(),
                    body,
                },
                headers: Some(headers),
            };
        }

        self.backoff.reset();
        tracing::debug!(url = %self.url, "Push channel connected");

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return PushError::Stream(e.to_string()).into(),
            };
            buffer.extend_from_slice(&chunk);

            while let Some(raw) = drain_next_sse_event(&mut buffer) {
                if raw.is_empty() {
                    continue;
                }
                let Ok(text) = str::from_utf8(&raw) else {
                    return PushError::InvalidUtf8.into();
                };
                self.dispatch(text, handlers);
            }

            if buffer.len() > MAX_SSE_BUFFER_BYTES {
                return PushError::BufferOverflow.into();
            }
        }

        PushError::Closed.into()
    }

    fn dispatch(&mut self, text: &str, handlers: &mut PushHandlers) {
        let frame = parse_sse_frame(text);
        if let Some(id) = &frame.id {
            self.last_event_id = Some(id.clone());
        }
        if let Some(retry) = frame.retry {
            self.backoff.set_server_delay(retry);
        }
        let name = frame.event_name().to_string();
        if let Some(data) = frame.data {
            tracing::trace!(event = %name, bytes = data.len(), "Push event");
            (handlers.on_event)(PushEvent {
                name,
                data,
                id: self.last_event_id.clone(),
            });
        }
    }
}
