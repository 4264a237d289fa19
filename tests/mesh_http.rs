//! Two real nodes on ephemeral ports, forwarding to each other over HTTP.

use record_mesh::router::handlers;
use record_mesh::router::protocol::{ENDPOINT_STATE, ENDPOINT_SUBMIT, ENDPOINT_TOPOLOGY};
use record_mesh::router::{
    ContentRouter, HttpTransport, Partitioner, RecordTransport, SubmitRecordRequest,
    SubmitRecordResponse, SubmitStatus,
};
use record_mesh::state::{StateHandle, StateLayout, StateStore};
use record_mesh::table::{LocalTable, table_file_name};
use record_mesh::topology::{NodeName, TopologyTable};

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

async fn ephemeral_listener() -> (tokio::net::TcpListener, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn start_node(
    dir: &Path,
    name: &str,
    topology: &Arc<TopologyTable>,
    listener: tokio::net::TcpListener,
) -> Arc<ContentRouter> {
    let state = StateHandle::new(
        StateStore::open(dir, name, StateLayout {
            history_capacity: 32,
            routed_capacity: 256,
            max_destinations: 4,
        })
        .unwrap(),
    );
    let table = Arc::new(LocalTable::open(dir.join(table_file_name(name)), 8).unwrap());
    let transport: Arc<dyn RecordTransport> = Arc::new(HttpTransport::new());
    let router = Arc::new(
        ContentRouter::new(NodeName::new(name), topology.clone(), state, table, transport)
            .unwrap(),
    );

    let app = handlers::routes(router.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    router
}

fn payload_for(partition: u32, suffix: &str) -> String {
    let partitioner = Partitioner::new(4);
    (0u64..)
        .map(|i| format!("{},{}", i, suffix))
        .find(|payload| partitioner.get_partition(payload.as_bytes()) == partition)
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_records_are_forwarded_over_http() {
    // ARRANGE: C owns 0-1, E owns 2-3, partition 3 left to E as collector
    let dir = tempfile::tempdir().unwrap();
    let (c_listener, c_addr) = ephemeral_listener().await;
    let (e_listener, e_addr) = ephemeral_listener().await;
    let json = format!(
        r#"{{
            "partitions": 4,
            "collector": "E",
            "residual_to_collector": true,
            "owners": {{ "C": [0, 1], "E": [2] }},
            "edges": [
                {{ "id": "C", "address": "{}" }},
                {{ "id": "E", "ip": "127.0.0.1", "port": {} }}
            ]
        }}"#,
        c_addr,
        e_addr.port()
    );
    let topology = Arc::new(TopologyTable::from_json(&json).unwrap());
    let c = start_node(dir.path(), "C", &topology, c_listener);
    let e = start_node(dir.path(), "E", &topology, e_listener);
    let client = reqwest::Client::new();

    // ACT: one record per partition, all entering at C
    for partition in 0..4u32 {
        let request = SubmitRecordRequest::new(
            partition as u64,
            payload_for(partition, "HTTP"),
            1_700_000_000_000,
        );
        let response = client
            .post(format!("http://{}{}", c_addr, ENDPOINT_SUBMIT))
            .json(&request)
            .send()
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: SubmitRecordResponse = response.json().await.unwrap();
        assert_eq!(body.status, SubmitStatus::Success);
    }

    let c_state = c.snapshot().unwrap();
    let e_state = e.snapshot().unwrap();
    assert_eq!(c_state.counter, 2);
    assert_eq!(e_state.counter, 2);
    assert_eq!(c_state.routed_to("E"), &[2, 3]);
    assert_eq!(e_state.history, vec![2, 3]);

    // Inspection endpoints serve the same view
    let served: serde_json::Value = client
        .get(format!("http://{}{}", e_addr, ENDPOINT_STATE))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(served["counter"], 2);

    let view: serde_json::Value = client
        .get(format!("http://{}{}", c_addr, ENDPOINT_TOPOLOGY))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["owned"], serde_json::json!([0, 1]));
    assert_eq!(view["fan_out"], serde_json::json!(["E"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unroutable_and_unreachable_status_codes() {
    // ARRANGE: partition 0 unowned, E listed but nothing serving it
    let dir = tempfile::tempdir().unwrap();
    let (c_listener, c_addr) = ephemeral_listener().await;
    let (dead_listener, dead_addr) = ephemeral_listener().await;
    drop(dead_listener);
    let json = format!(
        r#"{{
            "owners": {{ "C": [1, 2], "E": [3] }},
            "edges": [
                {{ "id": "C", "address": "{}" }},
                {{ "id": "E", "address": "{}" }}
            ]
        }}"#,
        c_addr, dead_addr
    );
    let topology = Arc::new(TopologyTable::from_json(&json).unwrap());
    let c = start_node(dir.path(), "C", &topology, c_listener);
    let client = reqwest::Client::new();
    let url = format!("http://{}{}", c_addr, ENDPOINT_SUBMIT);

    // ACT
    let unroutable = client
        .post(&url)
        .json(&SubmitRecordRequest::new(1, payload_for(0, "GAP"), 0))
        .send()
        .await
        .unwrap();
    let unreachable = client
        .post(&url)
        .json(&SubmitRecordRequest::new(2, payload_for(3, "DOWN"), 0))
        .send()
        .await
        .unwrap();

    // ASSERT
    assert_eq!(unroutable.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: SubmitRecordResponse = unroutable.json().await.unwrap();
    assert_eq!(body.status, SubmitStatus::Failure);
    assert_eq!(body.detail.as_deref(), Some("unroutable record"));

    assert_eq!(unreachable.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: SubmitRecordResponse = unreachable.json().await.unwrap();
    assert_eq!(body.detail.as_deref(), Some("forwarding failure"));

    let state = c.snapshot().unwrap();
    assert_eq!(state.history, vec![1, 2]);
    assert_eq!(state.counter, 0);
    assert_eq!(state.routed_to("E"), &[2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_body_gets_a_failure_response() {
    // ARRANGE
    let dir = tempfile::tempdir().unwrap();
    let (listener, addr) = ephemeral_listener().await;
    let json = format!(
        r#"{{ "owners": {{ "C": [0, 1, 2, 3] }}, "edges": [ {{ "id": "C", "address": "{}" }} ] }}"#,
        addr
    );
    let topology = Arc::new(TopologyTable::from_json(&json).unwrap());
    let c = start_node(dir.path(), "C", &topology, listener);
    let client = reqwest::Client::new();
    let url = format!("http://{}{}", addr, ENDPOINT_SUBMIT);

    // ACT: broken JSON, then valid JSON missing the payload
    let broken = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    let incomplete = client
        .post(&url)
        .json(&serde_json::json!({ "id": 5, "timestamp": 0 }))
        .send()
        .await
        .unwrap();

    // ASSERT: same response shape as any other failure
    assert_eq!(broken.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: SubmitRecordResponse = broken.json().await.unwrap();
    assert_eq!(body.status, SubmitStatus::Failure);
    assert_eq!(body.detail.as_deref(), Some("malformed request"));

    assert_eq!(incomplete.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: SubmitRecordResponse = incomplete.json().await.unwrap();
    assert_eq!(body.status, SubmitStatus::Failure);

    assert!(c.snapshot().unwrap().history.is_empty());
}
