//! Topology-aware JSON request client.
//!
//! # Architecture
//!
//! - [`RibbonClient`] - routes each request to the first server the current
//!   topology lists for a service and returns an [`Eventual`](ribbon_core::Eventual)
//! - [`push`] - the push channel that announces topology changes
//!   ([`SseChannel`] over server-sent events)
//! - [`transport`] - the HTTP exchange ([`ReqwestTransport`])
//! - [`credentials`] - optional bearer-token gating ([`StaticToken`])
//! - [`retry`] - reconnect backoff for the push channel
//!
//! Collaborators are traits with callback-shaped methods. The client bridges
//! each callback into an eventual with a [`Deferred`](ribbon_core::Deferred),
//! so a fake collaborator in tests only has to call its callback.
//!
//! # Request lifecycle
//!
//! | Step | Outcome on failure |
//! |------|--------------------|
//! | Pick first server for the service | `NoServers`, no I/O |
//! | Merge headers, build URL | - |
//! | Provider present but not authenticated | `NotAuthenticated`, no I/O |
//! | Refresh token, attach `Authorization` | `TokenRefresh`, no I/O |
//! | Exchange | `Connection` |
//! | Non-2xx status | `Status` |
//! | Parse JSON body | `Decode` |
//!
//! There is no retry or failover at any step.
//!
//! # Threading
//!
//! Everything is `Rc`-based and must run inside a `tokio::task::LocalSet`.

use std::time::Duration;

use reqwest::redirect::Policy;
use ribbon_config::ClientConfig;

mod client;
pub mod credentials;
mod error;
pub mod push;
pub mod retry;
mod sse;
mod topology;
pub mod transport;

pub use client::{RequestSettings, RibbonClient, RibbonClientBuilder};
pub use credentials::{CredentialProvider, StaticToken};
pub use error::{ClientError, ErrorKind};
pub use push::{PushChannel, PushError, PushEvent, PushHandlers, SseChannel, Subscription};
pub use topology::TopologyView;
pub use transport::{HttpExchange, HttpResponse, ReqwestTransport, Transport};

pub use ribbon_core;
pub use ribbon_types;

/// Push event name carrying a new topology.
pub const TOPOLOGY_CHANGE_EVENT: &str = "topologyChange";

const TCP_KEEPALIVE_SECS: u64 = 60;

/// Build the HTTP client shared by the transport and the push channel.
///
/// No overall timeout is set here: the push stream is long-lived. Request
/// timeouts are applied per exchange by [`ReqwestTransport`].
pub fn http_client(config: &ClientConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .user_agent(concat!("ribbon/", env!("CARGO_PKG_VERSION")))
        .build()
}
