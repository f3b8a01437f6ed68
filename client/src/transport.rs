//! The HTTP exchange collaborator.
//!
//! [`Transport`] is callback-shaped so it can wrap any I/O layer. The client
//! only ever sees it through [`exchange`], which turns the callback into an
//! [`Eventual`].

use std::time::Duration;

use futures_util::StreamExt;
use ribbon_core::{Deferred, Eventual};
use ribbon_types::{Headers, HttpMethod};
use tokio::task;

use crate::ClientError;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// A fully prepared request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpExchange {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Completion callback for one exchange. `Err` carries a transport-level cause.
pub type ExchangeCallback = Box<dyn FnOnce(Result<HttpResponse, String>)>;

pub trait Transport {
    /// Start `request` and call `on_complete` exactly once when it finishes.
    fn exchange(&self, request: HttpExchange, on_complete: ExchangeCallback);
}

/// Run one exchange and expose its completion as an eventual.
///
/// A transport that drops the callback without calling it leaves the
/// eventual to reject as abandoned once awaited.
pub fn exchange(
    transport: &dyn Transport,
    request: HttpExchange,
) -> Eventual<HttpResponse, ClientError> {
    let deferred = Deferred::new();
    let settle = deferred.clone();
    transport.exchange(
        request,
        Box::new(move |result| match result {
            Ok(response) => settle.resolve(response),
            Err(cause) => settle.reject(ClientError::Connection(cause)),
        }),
    );
    deferred.eventual()
}

/// [`Transport`] over a shared [`reqwest::Client`].
///
/// Each exchange runs as a task on the current `LocalSet`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: None,
        }
    }

    /// Per-request timeout. The shared client has none, so long-lived push
    /// streams on it are not cut off.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Transport for ReqwestTransport {
    fn exchange(&self, request: HttpExchange, on_complete: ExchangeCallback) {
        let http = self.http.clone();
        let timeout = self.timeout;
        drop(task::spawn_local(async move {
            on_complete(send(&http, request, timeout).await);
        }));
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

async fn send(
    http: &reqwest::Client,
    request: HttpExchange,
    timeout: Option<Duration>,
) -> Result<HttpResponse, String> {
    let mut builder = http.request(reqwest_method(request.method), &request.url);
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    let response = builder.send().await.map_err(|e| {
        tracing::debug!(url = %request.url, error = %e, "Request failed");
        e.to_string()
    })?;

    let status = response.status();
    let status_text = status
        .canonical_reason()
        .map_or_else(|| status.as_str().to_string(), str::to_string);
    let body = if status.is_success() {
        response.text().await.map_err(|e| e.to_string())?
    } else {
        let body = read_capped_error_body(response).await;
        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            %body,
            "Non-success response"
        );
        body
    };

    Ok(HttpResponse {
        status: status.as_u16(),
        status_text,
        body,
    })
}

pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
