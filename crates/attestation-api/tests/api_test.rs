//! Integration tests for the Attestation API

use attestation_api::{create_router, AppState};
use attestation_client::registry::mock::{DEMO_ATTESTER, DEMO_RECIPIENT};
use attestation_client::{schema, Address, AttestationClient, MockRegistry, SigningSession, Uid};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

const YIRGACHEFFE_UID: &str = "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

fn schema_uid() -> Uid {
    schema::schema_uid(Address::ZERO, true)
}

fn create_test_app(registry: Arc<MockRegistry>, signer: Option<Address>) -> Router {
    let mut client = AttestationClient::new(registry, schema_uid());
    if let Some(sender) = signer {
        client.connect_signer(SigningSession { sender });
    }

    let state = AppState::new(client)
        .with_explorer_url(Some("https://sepolia.etherscan.io".to_string()));
    create_router(state)
}

fn demo_app() -> Router {
    create_test_app(Arc::new(MockRegistry::with_demo_records(schema_uid())), None)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn submission(transaction_hash: &str) -> Value {
    json!({
        "recipient": DEMO_RECIPIENT.to_hex(),
        "payload": {
            "coffeeName": "Sumatra Mandheling",
            "origin": "Indonesia",
            "date": "2024-02-01",
            "price": "21.50",
            "roastLevel": "Dark",
            "quantity": 300,
            "processingMethod": "Wet-hulled",
            "transactionHash": transaction_hash
        }
    })
}

#[tokio::test]
async fn test_health_check() {
    let (status, json) = get(demo_app(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "attestation-api");
}

#[tokio::test]
async fn test_get_demo_attestation() {
    let (status, json) = get(demo_app(), &format!("/api/attestations/{}", YIRGACHEFFE_UID)).await;

    assert_eq!(status, StatusCode::OK);
    let attestation = &json["attestation"];
    assert_eq!(attestation["id"], YIRGACHEFFE_UID);
    assert_eq!(attestation["attester"], DEMO_ATTESTER.to_hex());
    assert_eq!(attestation["createdAt"], 1_704_067_200u64);
    assert_eq!(attestation["payload"]["coffeeName"], "Ethiopian Yirgacheffe");
    assert_eq!(attestation["payload"]["quantity"], 500);
    assert_eq!(attestation["payload"]["farm"], "Kochere Cooperative");
    // No settlement hash recorded, so no explorer link
    assert!(json.get("transactionUrl").is_none());
}

#[tokio::test]
async fn test_get_missing_attestation() {
    let missing = format!("0x{}", "00".repeat(31) + "01");
    let (status, json) = get(demo_app(), &format!("/api/attestations/{}", missing)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Attestation not found. Please check the UID.");
}

#[tokio::test]
async fn test_get_malformed_uid_is_not_found() {
    let (status, _) = get(demo_app(), "/api/attestations/0xdoesnotexist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registry_outage_is_not_found() {
    let registry = Arc::new(MockRegistry::with_demo_records(schema_uid()));
    registry.fail_next_lookup();
    let app = create_test_app(registry, None);

    let (status, _) = get(app, &format!("/api/attestations/{}", YIRGACHEFFE_UID)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_recipient_attestations() {
    let uri = format!("/api/recipients/{}/attestations", DEMO_RECIPIENT);
    let (status, json) = get(demo_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
    assert_eq!(json["attestations"], json!([]));
}

#[tokio::test]
async fn test_list_rejects_bad_address() {
    let (status, json) = get(demo_app(), "/api/recipients/0x1234/attestations").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid address"));
}

#[tokio::test]
async fn test_submit_without_signer() {
    let registry = Arc::new(MockRegistry::new());
    let app = create_test_app(registry.clone(), None);

    let (status, json) = post_json(app, "/api/attestations", submission("")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        json["error"],
        "Please connect a wallet to create attestations."
    );
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_submit_and_fetch() {
    let registry = Arc::new(MockRegistry::new());
    let tx_hash = format!("0x{}", "cd".repeat(32));

    let app = create_test_app(registry.clone(), Some(DEMO_ATTESTER));
    let (status, json) = post_json(app, "/api/attestations", submission(&tx_hash)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    let uid = json["uid"].as_str().unwrap().to_string();
    assert_eq!(registry.len().await, 1);

    let app = create_test_app(registry, None);
    let (status, json) = get(app, &format!("/api/attestations/{}", uid)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["attestation"]["payload"]["coffeeName"], "Sumatra Mandheling");
    assert_eq!(json["attestation"]["payload"]["processingMethod"], "Wet-hulled");
    assert_eq!(json["attestation"]["recipient"], DEMO_RECIPIENT.to_hex());
    assert_eq!(
        json["transactionUrl"],
        format!("https://sepolia.etherscan.io/tx/{}", tx_hash)
    );
}

#[tokio::test]
async fn test_submit_rejected_by_registry() {
    let registry = Arc::new(MockRegistry::new());
    registry.reject_next_attest();
    let app = create_test_app(registry.clone(), Some(DEMO_ATTESTER));

    let (status, json) = post_json(app, "/api/attestations", submission("")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Transaction failed:"));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_submit_invalid_transaction_hash() {
    let registry = Arc::new(MockRegistry::new());
    let app = create_test_app(registry.clone(), Some(DEMO_ATTESTER));

    let (status, _) = post_json(app, "/api/attestations", submission("0xabc123...")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(registry.is_empty().await);
}
