//! Request construction and response handling against in-memory fakes.

use ribbon_client::{ClientError, ErrorKind, RequestSettings};
use ribbon_config::ClientConfig;
use ribbon_types::HttpMethod;
use serde_json::json;

use crate::common::{Harness, ok_json, on_local, status};

fn config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.headers.insert("Accept", "application/json");
    config.headers.insert("X-Client", "ribbon");
    config
}

#[tokio::test]
async fn unknown_service_rejects_without_io() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);

        let result = harness.client.request("unknownService", "/x", RequestSettings::new());
        let err = result.await.unwrap_err();

        assert_eq!(
            err,
            ClientError::NoServers {
                service: "unknownService".to_string(),
            }
        );
        assert_eq!(err.kind(), ErrorKind::Routing);
        assert_eq!(harness.transport.call_count(), 0);
    })
    .await;
}

#[tokio::test]
async fn service_with_empty_server_list_rejects() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":[]}"#);

        let err = harness.client.get_json("svc", "/x").await.unwrap_err();
        assert!(matches!(err, ClientError::NoServers { .. }));
        assert_eq!(harness.transport.call_count(), 0);
    })
    .await;
}

#[tokio::test]
async fn targets_first_server_with_defaults() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80","h2:80"]}"#);
        harness.transport.respond_with(ok_json(r#"{"items":[1,2]}"#));

        let value = harness.client.get_json("svc", "/items").await.unwrap();
        assert_eq!(value, json!({"items": [1, 2]}));

        let calls = harness.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, HttpMethod::Get);
        assert_eq!(calls[0].url, "http://h1:80/items");
        assert_eq!(calls[0].headers.get("x-client"), Some("ribbon"));
        assert!(!calls[0].headers.contains("content-type"));
        assert_eq!(calls[0].body, None);
    })
    .await;
}

#[tokio::test]
async fn path_is_normalised() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);

        harness.client.get_json("svc", "").await.unwrap();
        harness.client.get_json("svc", "status").await.unwrap();

        let urls: Vec<_> = harness.transport.calls().into_iter().map(|c| c.url).collect();
        assert_eq!(urls, vec!["http://h1:80/", "http://h1:80/status"]);
    })
    .await;
}

#[tokio::test]
async fn scheme_comes_from_config() {
    on_local(async {
        let mut config = config();
        config.scheme = "https".to_string();
        let harness = Harness::new(config);
        harness.push.publish_topology(r#"{"svc":["h1:443"]}"#);

        harness.client.get_json("svc", "/x").await.unwrap();
        assert_eq!(harness.transport.calls()[0].url, "https://h1:443/x");
    })
    .await;
}

#[tokio::test]
async fn per_call_headers_merge_per_key() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);

        let settings = RequestSettings::new()
            .header("accept", "text/plain")
            .header("X-Trace", "abc");
        harness.client.request("svc", "/x", settings).await.unwrap();

        let headers = &harness.transport.calls()[0].headers;
        assert_eq!(headers.get("Accept"), Some("text/plain"));
        assert_eq!(headers.get("X-Client"), Some("ribbon"));
        assert_eq!(headers.get("x-trace"), Some("abc"));
        assert_eq!(headers.len(), 3);
    })
    .await;
}

#[tokio::test]
async fn post_sets_json_content_type_without_leaking_into_defaults() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);

        harness
            .client
            .post_json("svc", "/orders", &json!({"id": 7}))
            .await
            .unwrap();
        harness.client.get_json("svc", "/orders").await.unwrap();

        let calls = harness.transport.calls();
        assert_eq!(calls[0].method, HttpMethod::Post);
        assert_eq!(calls[0].headers.get("content-type"), Some("application/json"));
        assert_eq!(calls[0].body.as_deref(), Some(r#"{"id":7}"#));
        assert_eq!(calls[1].method, HttpMethod::Get);
        assert!(!calls[1].headers.contains("content-type"));
    })
    .await;
}

#[tokio::test]
async fn post_to_root_uses_slash() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);

        harness
            .client
            .post_json_to_root("svc", &json!(["a"]))
            .await
            .unwrap();

        let call = &harness.transport.calls()[0];
        assert_eq!(call.url, "http://h1:80/");
        assert_eq!(call.body.as_deref(), Some(r#"["a"]"#));
    })
    .await;
}

#[tokio::test]
async fn configured_default_method_applies() {
    on_local(async {
        let mut config = config();
        config.method = HttpMethod::Put;
        let harness = Harness::new(config);
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);

        harness.client.get_json("svc", "/x").await.unwrap();
        let call = &harness.transport.calls()[0];
        assert_eq!(call.method, HttpMethod::Put);
        assert_eq!(call.headers.get("content-type"), Some("application/json"));
    })
    .await;
}

#[tokio::test]
async fn non_success_status_rejects_with_status_text() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);
        harness.transport.respond_with(status(404, "Not Found"));

        let err = harness.client.get_json("svc", "/missing").await.unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Not Found");
        assert_eq!(err.kind(), ErrorKind::Transport);
    })
    .await;
}

#[tokio::test]
async fn transport_failure_rejects() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);
        harness
            .transport
            .respond_with(Err("connection refused".to_string()));

        let err = harness.client.get_json("svc", "/x").await.unwrap_err();
        assert_eq!(err, ClientError::Connection("connection refused".to_string()));
    })
    .await;
}

#[tokio::test]
async fn empty_and_invalid_bodies() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);
        harness.transport.respond_with(status(204, "No Content"));
        harness.transport.respond_with(ok_json("not json"));

        assert_eq!(
            harness.client.get_json("svc", "/x").await,
            Ok(serde_json::Value::Null)
        );
        let err = harness.client.get_json("svc", "/x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    })
    .await;
}

#[tokio::test]
async fn unserialisable_body_rejects_without_io() {
    on_local(async {
        let harness = Harness::new(config());
        harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);

        let mut body = std::collections::HashMap::new();
        body.insert(vec![1_u8], "non-string key");
        let err = harness.client.post_json("svc", "/x", &body).await.unwrap_err();

        assert!(matches!(err, ClientError::Encode(_)), "{err:?}");
        assert_eq!(harness.transport.call_count(), 0);
    })
    .await;
}
