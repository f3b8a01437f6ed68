use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use ribbon_config::ClientConfig;
use ribbon_core::{Eventual, Resolution};
use ribbon_types::{Headers, HttpMethod, ServerAddress, Topology};
use serde::Serialize;
use serde_json::Value;

use crate::credentials::{self, CredentialProvider};
use crate::push::{PushChannel, PushHandlers, Subscription};
use crate::retry::BackoffConfig;
use crate::topology::{TopologyState, TopologyView};
use crate::transport::{self, HttpExchange, HttpResponse, ReqwestTransport, Transport};
use crate::{ClientError, SseChannel, TOPOLOGY_CHANGE_EVENT, http_client};

const AUTHORIZATION: &str = "Authorization";
const CONTENT_TYPE: &str = "Content-Type";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-call overrides. Anything left unset falls back to the client defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSettings {
    pub method: Option<HttpMethod>,
    /// Merged over the default headers, one key at a time.
    pub headers: Headers,
    pub body: Option<String>,
}

impl RequestSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Defaults applied to every request.
#[derive(Debug, Clone)]
struct RequestDefaults {
    scheme: String,
    method: HttpMethod,
    headers: Headers,
    auth_refresh_interval: Duration,
}

impl From<&ClientConfig> for RequestDefaults {
    fn from(config: &ClientConfig) -> Self {
        Self {
            scheme: config.scheme.clone(),
            method: config.method,
            headers: config.expanded_headers(),
            auth_refresh_interval: Duration::from_secs(config.auth_refresh_interval_secs),
        }
    }
}

/// Routes JSON requests to whichever server the latest topology names first.
///
/// The client subscribes to topology changes when it is built and keeps the
/// subscription until it is dropped. Everything here runs on one thread inside
/// a `tokio::task::LocalSet`.
pub struct RibbonClient {
    defaults: RequestDefaults,
    transport: Rc<dyn Transport>,
    credentials: Option<Rc<dyn CredentialProvider>>,
    topology: TopologyState,
    _subscription: Subscription,
}

impl RibbonClient {
    #[must_use]
    pub fn builder(config: ClientConfig) -> RibbonClientBuilder {
        RibbonClientBuilder::new(config)
    }

    /// Send a request to the first server of `service`.
    ///
    /// Rejects without any I/O when the topology has no server for the
    /// service, or when a credential provider is configured but not
    /// authenticated.
    pub fn request(
        &self,
        service: &str,
        path: &str,
        settings: RequestSettings,
    ) -> Eventual<Value, ClientError> {
        let topology = self.topology.snapshot();
        let Some(server) = topology.first_server(service) else {
            tracing::debug!(service, "No servers available");
            return Eventual::rejected(ClientError::NoServers {
                service: service.to_string(),
            });
        };
        let request = self.prepare(server, path, settings);

        let Some(provider) = &self.credentials else {
            return dispatch(self.transport.as_ref(), request);
        };
        if !provider.is_authenticated() {
            tracing::debug!(service, "Credential provider is not authenticated");
            return Eventual::rejected(ClientError::NotAuthenticated);
        }

        let transport = Rc::clone(&self.transport);
        let refreshed = credentials::refresh(provider, self.defaults.auth_refresh_interval);
        refreshed.and_then(move |token| {
            let mut request = request;
            request
                .headers
                .insert(AUTHORIZATION, token.authorization_value());
            Ok(Resolution::from(dispatch(transport.as_ref(), request)))
        })
    }

    /// [`request`](Self::request) with the client defaults.
    pub fn get_json(&self, service: &str, path: &str) -> Eventual<Value, ClientError> {
        self.request(service, path, RequestSettings::new())
    }

    /// `POST` `body` as JSON to `path` on `service`.
    pub fn post_json<B>(
        &self,
        service: &str,
        path: &str,
        body: &B,
    ) -> Eventual<Value, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let body = match serde_json::to_string(body) {
            Ok(body) => body,
            Err(e) => return Eventual::rejected(ClientError::Encode(e.to_string())),
        };
        self.request(
            service,
            path,
            RequestSettings::new().method(HttpMethod::Post).body(body),
        )
    }

    /// [`post_json`](Self::post_json) to the service root.
    pub fn post_json_to_root<B>(&self, service: &str, body: &B) -> Eventual<Value, ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.post_json(service, "/", body)
    }

    /// Call `observer` with the raw payload of every topology-change event,
    /// after the topology has been updated.
    pub fn on_topology_change(&self, observer: impl FnMut(&str) + 'static) {
        self.topology.observe(Box::new(observer));
    }

    /// The topology as of now. Later changes swap in a new snapshot and leave
    /// this one untouched.
    #[must_use]
    pub fn topology(&self) -> Rc<Topology> {
        self.topology.snapshot()
    }

    #[must_use]
    pub fn topology_view(&self) -> TopologyView {
        self.topology.view()
    }

    fn prepare(
        &self,
        server: &ServerAddress,
        path: &str,
        settings: RequestSettings,
    ) -> HttpExchange {
        let method = settings.method.unwrap_or(self.defaults.method);
        let mut headers = self.defaults.headers.clone();
        headers.extend_from(&settings.headers);
        if method.is_body_bearing() {
            headers.insert(CONTENT_TYPE, JSON_CONTENT_TYPE);
        }
        HttpExchange {
            method,
            url: request_url(&self.defaults.scheme, server, path),
            headers,
            body: settings.body,
        }
    }
}

impl fmt::Debug for RibbonClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RibbonClient")
            .field("defaults", &self.defaults)
            .field("credentials", &self.credentials.is_some())
            .field("topology", &self.topology.snapshot())
            .finish_non_exhaustive()
    }
}

fn request_url(scheme: &str, server: &ServerAddress, path: &str) -> String {
    match path {
        "" => format!("{scheme}://{server}/"),
        p if p.starts_with('/') => format!("{scheme}://{server}{p}"),
        p => format!("{scheme}://{server}/{p}"),
    }
}

fn dispatch(transport: &dyn Transport, request: HttpExchange) -> Eventual<Value, ClientError> {
    tracing::debug!(method = %request.method, url = %request.url, "Dispatching request");
    transport::exchange(transport, request)
        .and_then(|response| decode_response(response).map(Resolution::Value))
}

fn decode_response(response: HttpResponse) -> Result<Value, ClientError> {
    if !response.is_success() {
        tracing::debug!(status = response.status, "Request rejected by server");
        let status_text = if response.status_text.trim().is_empty() {
            response.status.to_string()
        } else {
            response.status_text
        };
        return Err(ClientError::Status {
            status: response.status,
            status_text,
        });
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| ClientError::Decode(e.to_string()))
}

fn shared_http(
    http: &mut Option<reqwest::Client>,
    config: &ClientConfig,
) -> Result<reqwest::Client, reqwest::Error> {
    if let Some(http) = http {
        return Ok(http.clone());
    }
    let client = http_client(config)?;
    *http = Some(client.clone());
    Ok(client)
}

/// Wires a [`RibbonClient`] to its collaborators.
///
/// Unset collaborators default to a [`ReqwestTransport`] and an
/// [`SseChannel`] sharing one HTTP client, with no credential provider.
pub struct RibbonClientBuilder {
    config: ClientConfig,
    transport: Option<Rc<dyn Transport>>,
    push_channel: Option<Rc<dyn PushChannel>>,
    credentials: Option<Rc<dyn CredentialProvider>>,
}

impl RibbonClientBuilder {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            push_channel: None,
            credentials: None,
        }
    }

    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Rc::new(transport));
        self
    }

    #[must_use]
    pub fn push_channel(mut self, channel: impl PushChannel + 'static) -> Self {
        self.push_channel = Some(Rc::new(channel));
        self
    }

    #[must_use]
    pub fn credentials(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credentials = Some(Rc::new(provider));
        self
    }

    /// Build the client and subscribe to topology changes.
    ///
    /// # Errors
    ///
    /// Fails only when a default collaborator is needed and the HTTP client
    /// cannot be constructed.
    ///
    /// # Panics
    ///
    /// The default push channel must be subscribed from inside a
    /// `tokio::task::LocalSet`.
    pub fn build(self) -> Result<RibbonClient, reqwest::Error> {
        let mut http = None;
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let timeout = self.config.request_timeout_secs.map(Duration::from_secs);
                let http = shared_http(&mut http, &self.config)?;
                Rc::new(ReqwestTransport::new(http).with_timeout(timeout))
            }
        };
        let push_channel = match self.push_channel {
            Some(channel) => channel,
            None => Rc::new(
                SseChannel::new(shared_http(&mut http, &self.config)?, self.config.origin.clone())
                    .with_backoff(BackoffConfig::from(&self.config.reconnect)),
            ),
        };

        let topology = TopologyState::default();
        let listener = topology.clone();
        let subscription = push_channel.subscribe(
            &self.config.push_channel_path,
            PushHandlers::new(
                move |event| {
                    if event.name == TOPOLOGY_CHANGE_EVENT {
                        listener.apply_change(&event.data);
                    }
                },
                |error| tracing::debug!(%error, "Topology channel error"),
            ),
        );
        tracing::debug!(path = %self.config.push_channel_path, "Subscribed to topology changes");

        Ok(RibbonClient {
            defaults: RequestDefaults::from(&self.config),
            transport,
            credentials: self.credentials,
            topology,
            _subscription: subscription,
        })
    }
}
