mod common;

use common::{TestServer, udp_query};
use serde_json::json;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use tsns::admin::RecordsResponse;
use tsns::dns::enums::DNSResourceType;
use tsns::records::RecordStore;

#[tokio::test]
async fn test_add_resolve_delete_flow() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/records"))
        .json(&json!({ "name": "svc", "ip": "10.0.0.9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let snapshot: serde_json::Value =
        serde_json::from_slice(&fs::read(server.snapshot_path()).unwrap()).unwrap();
    assert_eq!(
        snapshot,
        json!({ "entries": [{ "name": "svc", "ip": "10.0.0.9" }] })
    );

    let answer = udp_query(server.udp_addr, "svc.", DNSResourceType::A).await;
    assert_eq!(answer.answers.len(), 1);
    assert_eq!(
        answer.answers[0].ip(),
        Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)))
    );

    let response = client.delete(server.url("/records/svc")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: RecordsResponse = response.json().await.unwrap();
    assert!(body.entries.is_empty());

    let snapshot: serde_json::Value =
        serde_json::from_slice(&fs::read(server.snapshot_path()).unwrap()).unwrap();
    assert_eq!(snapshot, json!({ "entries": [] }));

    let answer = udp_query(server.udp_addr, "svc.", DNSResourceType::A).await;
    assert!(answer.answers.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_records_survive_restart() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    for (name, ip) in [("web", "10.0.0.1"), ("db", "10.0.0.2")] {
        client
            .post(server.url("/records"))
            .json(&json!({ "name": name, "ip": ip }))
            .send()
            .await
            .unwrap();
    }
    let expected = server.store.list();

    let TestServer {
        data_dir, store, ..
    } = server;
    drop(store);

    let reopened = RecordStore::open(data_dir.path()).unwrap();
    assert_eq!(reopened.list(), expected);

    let restarted = TestServer::start_in(data_dir).await;
    let answer = udp_query(restarted.udp_addr, "db.", DNSResourceType::A).await;
    assert_eq!(
        answer.answers[0].ip(),
        Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
    );
    restarted.stop().await;
}
