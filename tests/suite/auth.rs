//! Credential gating of requests.

use std::time::Duration;

use ribbon_client::{ClientError, ErrorKind};
use ribbon_config::ClientConfig;

use crate::common::{FakeCredentials, Harness, on_local};

const TOPOLOGY: &str = r#"{"svc":["h1:80"]}"#;

#[tokio::test]
async fn unauthenticated_provider_blocks_io() {
    on_local(async {
        let harness =
            Harness::with_credentials(ClientConfig::default(), FakeCredentials::signed_out());
        harness.push.publish_topology(TOPOLOGY);

        let err = harness.client.get_json("svc", "/x").await.unwrap_err();

        assert_eq!(err, ClientError::NotAuthenticated);
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(harness.transport.call_count(), 0);
    })
    .await;
}

#[tokio::test]
async fn bearer_token_is_attached() {
    on_local(async {
        let harness =
            Harness::with_credentials(ClientConfig::default(), FakeCredentials::fixed("T"));
        harness.push.publish_topology(TOPOLOGY);

        harness.client.get_json("svc", "/x").await.unwrap();

        let calls = harness.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].headers.get("authorization"), Some("Bearer T"));
    })
    .await;
}

#[tokio::test]
async fn token_is_read_after_refresh() {
    on_local(async {
        let credentials = FakeCredentials::rotating("T");
        let harness = Harness::with_credentials(ClientConfig::default(), credentials.clone());
        harness.push.publish_topology(TOPOLOGY);

        harness.client.get_json("svc", "/a").await.unwrap();
        harness.client.get_json("svc", "/b").await.unwrap();

        let tokens: Vec<_> = harness
            .transport
            .calls()
            .iter()
            .map(|call| call.headers.get("Authorization").map(str::to_string))
            .collect();
        assert_eq!(
            tokens,
            vec![Some("Bearer T-1".to_string()), Some("Bearer T-2".to_string())]
        );
        assert_eq!(credentials.refreshes().len(), 2);
    })
    .await;
}

#[tokio::test]
async fn refresh_uses_configured_interval() {
    on_local(async {
        let mut config = ClientConfig::default();
        config.auth_refresh_interval_secs = 45;
        let credentials = FakeCredentials::fixed("T");
        let harness = Harness::with_credentials(config, credentials.clone());
        harness.push.publish_topology(TOPOLOGY);

        harness.client.get_json("svc", "/x").await.unwrap();
        assert_eq!(credentials.refreshes(), vec![Duration::from_secs(45)]);
    })
    .await;
}

#[tokio::test]
async fn refresh_failure_rejects_without_io() {
    on_local(async {
        let credentials = FakeCredentials::fixed("T");
        credentials.fail_next_refresh("session expired");
        let harness = Harness::with_credentials(ClientConfig::default(), credentials);
        harness.push.publish_topology(TOPOLOGY);

        let err = harness.client.get_json("svc", "/x").await.unwrap_err();

        assert_eq!(err, ClientError::TokenRefresh("session expired".to_string()));
        assert_eq!(harness.transport.call_count(), 0);
    })
    .await;
}

#[tokio::test]
async fn missing_token_after_refresh_rejects_without_io() {
    on_local(async {
        let credentials = FakeCredentials::tokenless();
        let harness = Harness::with_credentials(ClientConfig::default(), credentials.clone());
        harness.push.publish_topology(TOPOLOGY);

        let err = harness.client.get_json("svc", "/x").await.unwrap_err();

        assert_eq!(err, ClientError::MissingToken);
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(credentials.refreshes().len(), 1);
        assert_eq!(harness.transport.call_count(), 0);
    })
    .await;
}

#[tokio::test]
async fn failure_after_refresh_rejects_the_request() {
    on_local(async {
        let harness =
            Harness::with_credentials(ClientConfig::default(), FakeCredentials::fixed("T"));
        harness.push.publish_topology(TOPOLOGY);
        harness
            .transport
            .respond_with(Err("connection reset".to_string()));

        let err = harness.client.get_json("svc", "/x").await.unwrap_err();

        assert_eq!(err, ClientError::Connection("connection reset".to_string()));
        assert_eq!(harness.transport.call_count(), 1);
    })
    .await;
}

#[tokio::test]
async fn routing_is_checked_before_credentials() {
    on_local(async {
        let credentials = FakeCredentials::fixed("T");
        let harness = Harness::with_credentials(ClientConfig::default(), credentials.clone());

        let err = harness.client.get_json("svc", "/x").await.unwrap_err();

        assert!(matches!(err, ClientError::NoServers { .. }));
        assert!(credentials.refreshes().is_empty());
    })
    .await;
}
