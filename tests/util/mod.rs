#![allow(dead_code)]

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use bfc_status::prelude::*;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PUBLISHER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
pub const PUBLISHER_LOWER: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";

pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn status_entry(id: &str) -> Value {
    json!({
        "id": id,
        "type": "BFCStatusEntry",
        "statusPurpose": "revocation",
        "statusPublisher": format!("did:ethr:{}", PUBLISHER)
    })
}

pub fn json_ld_credential(status_id: &str) -> Value {
    json!({
        "@context": ["https://www.w3.org/2018/credentials/v1"],
        "type": ["VerifiableCredential"],
        "issuer": format!("did:ethr:{}", PUBLISHER),
        "credentialSubject": { "id": "did:example:holder" },
        "credentialStatus": status_entry(status_id)
    })
}

pub fn jwt_credential(payload: &Value) -> Value {
    let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256K","typ":"JWT"}"#);
    let body = BASE64_URL_SAFE_NO_PAD.encode(payload.to_string());
    let signature = BASE64_URL_SAFE_NO_PAD.encode([7u8; 64]);
    Value::String(format!("{}.{}.{}", header, body, signature))
}

pub fn status_id(index: &str) -> String {
    format!("eip155:11155111:{}:{}", PUBLISHER, index)
}

/// A cascade where `valid` are members and `revoked` are not
pub fn cascade_hex(valid: &[&str], revoked: &[&str]) -> String {
    BloomCascade::build(valid, revoked, 0.01)
        .unwrap()
        .to_hex()
}

/// Serve one blob transaction per `(block, versioned hash, data)` from a
/// Blobscan style API
pub async fn mount_blobscan(server: &MockServer, blobs: &[(u64, &str, &str)]) {
    let transactions: Vec<Value> = blobs
        .iter()
        .map(|(block, versioned_hash, _)| {
            json!({
                "hash": format!("0x{:064x}", block),
                "blockNumber": block,
                "from": PUBLISHER_LOWER,
                "blobs": [{ "versionedHash": versioned_hash, "index": 0 }]
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("from", PUBLISHER_LOWER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": transactions,
            "totalTransactions": blobs.len()
        })))
        .mount(server)
        .await;
    for (_, versioned_hash, data) in blobs {
        mount_blob(server, versioned_hash, data).await;
    }
}

pub async fn mount_blob(server: &MockServer, versioned_hash: &str, data: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/blobs/{}", versioned_hash)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "versionedHash": versioned_hash,
            "data": data
        })))
        .mount(server)
        .await;
}

pub fn blobscan_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        blob_scan_base_url: Some(server.uri()),
        provider_timeout_ms: Some(2_000),
        deadline_ms: Some(10_000),
        ..ApiConfig::default()
    }
}
