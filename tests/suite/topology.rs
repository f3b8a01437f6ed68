//! Topology updates arriving over the push channel.

use std::cell::RefCell;
use std::rc::Rc;

use ribbon_client::ClientError;
use ribbon_config::ClientConfig;

use crate::common::{Harness, on_local};

#[test]
fn subscribes_to_configured_path() {
    let mut config = ClientConfig::default();
    config.push_channel_path = "/ops/system/stream".to_string();
    let harness = Harness::new(config);
    assert_eq!(harness.push.subscribed_paths(), vec!["/ops/system/stream"]);
}

#[tokio::test]
async fn later_topology_replaces_earlier() {
    on_local(async {
        let harness = Harness::new(ClientConfig::default());
        harness.push.publish_topology(r#"{"svc":["h1:80","h2:80"]}"#);
        harness.push.publish_topology(r#"{"svc":["h3:80"]}"#);

        harness.client.get_json("svc", "/x").await.unwrap();

        let calls = harness.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "http://h3:80/x");
    })
    .await;
}

#[tokio::test]
async fn services_missing_from_new_topology_are_gone() {
    on_local(async {
        let harness = Harness::new(ClientConfig::default());
        harness.push.publish_topology(r#"{"a":["h1:80"],"b":["h2:80"]}"#);
        harness.push.publish_topology(r#"{"b":["h3:80"]}"#);

        let err = harness.client.get_json("a", "/x").await.unwrap_err();
        assert!(matches!(err, ClientError::NoServers { .. }));
        assert_eq!(harness.client.topology().servers("b").len(), 1);
    })
    .await;
}

#[test]
fn snapshot_is_unaffected_by_later_changes() {
    let harness = Harness::new(ClientConfig::default());
    harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);
    let snapshot = harness.client.topology();
    let view = harness.client.topology_view();

    harness.push.publish_topology(r#"{"svc":["h2:80"]}"#);

    assert_eq!(snapshot.first_server("svc").unwrap().as_str(), "h1:80");
    assert_eq!(view.current().first_server("svc").unwrap().as_str(), "h2:80");
}

#[test]
fn observers_see_raw_payload_after_update() {
    let harness = Harness::new(ClientConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    let view = harness.client.topology_view();
    harness.client.on_topology_change(move |payload| {
        let servers = view.current().servers("svc").len();
        record.borrow_mut().push((payload.to_string(), servers));
    });

    harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);

    assert_eq!(
        *seen.borrow(),
        vec![(r#"{"svc":["h1:80"]}"#.to_string(), 1)]
    );
}

#[test]
fn invalid_payload_keeps_current_topology() {
    let harness = Harness::new(ClientConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    harness
        .client
        .on_topology_change(move |payload| record.borrow_mut().push(payload.to_string()));

    harness.push.publish_topology(r#"{"svc":["h1:80"]}"#);
    harness.push.publish_topology("{ truncated");
    harness.push.publish_topology(r#"{"svc":["http://h2:80"]}"#);

    assert_eq!(
        harness.client.topology().first_server("svc").unwrap().as_str(),
        "h1:80"
    );
    assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn other_event_names_are_ignored() {
    let harness = Harness::new(ClientConfig::default());
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    harness
        .client
        .on_topology_change(move |_| *counter.borrow_mut() += 1);

    harness.push.publish("message", r#"{"svc":["h1:80"]}"#);
    harness.push.publish("heartbeat", "");

    assert!(harness.client.topology().is_empty());
    assert_eq!(*calls.borrow(), 0);
}
