mod identifier;

pub use identifier::*;

use crate::{error::Error, StatusResult};
use base64::Engine;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CREDENTIAL_STATUS: &str = "credentialStatus";

/// The status entry type this crate understands
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum StatusType {
    /// Revocation published as a bloom filter cascade
    #[serde(rename = "BFCStatusEntry")]
    BfcStatusEntry,
}

/// The purpose of a status entry
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPurpose {
    /// The status entry signals revocation
    Revocation,
}

/// The credential status entry carried by a verifiable credential
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    /// Colon delimited identifier holding the publisher address and,
    /// as the last segment, the revocation index
    pub id: String,
    /// The status entry type
    #[serde(rename = "type")]
    pub status_type: StatusType,
    /// The status purpose
    pub status_purpose: StatusPurpose,
    /// The publishing authority
    pub status_publisher: String,
}

impl CredentialStatus {
    /// Split the status id into publisher address and revocation index
    pub fn resolve(&self) -> StatusResult<ResolvedIdentifier> {
        resolve_identifier(&self.id)
    }
}

/// The two encodings a verifiable credential may arrive in
enum Encoding<'a> {
    CompactJwt(&'a str),
    JsonLd(&'a serde_json::Map<String, Value>),
}

impl<'a> Encoding<'a> {
    fn detect(vc: &'a Value) -> StatusResult<Self> {
        match vc {
            Value::String(s) if is_compact_jwt(s) => Ok(Self::CompactJwt(s)),
            Value::Object(m) => Ok(Self::JsonLd(m)),
            Value::String(_) => Err(Error::MalformedCredential(
                "string credential is not a compact JWT".to_string(),
            )),
            _ => Err(Error::MalformedCredential(
                "credential is neither a JWT nor a JSON-LD object".to_string(),
            )),
        }
    }
}

fn is_compact_jwt(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    // an unsecured JWT has an empty signature part
    parts.len() == 3 && !parts[0].is_empty() && !parts[1].is_empty()
}

fn decode_jwt_payload(jwt: &str) -> StatusResult<Value> {
    let payload = jwt.split('.').nth(1).unwrap_or_default();
    let bytes = base64::prelude::BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::MalformedCredential(format!("JWT payload is not base64url: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedCredential(format!("JWT payload is not JSON: {}", e)))
}

/// Extract the credential status from a verifiable credential.
///
/// `vc` is either a JSON string holding a compact JWT or a JSON-LD object.
/// The JWT signature is not checked. Inside a JWT the status is read from
/// the payload root, falling back to the `vc` claim.
pub fn extract_credential_status(vc: &Value) -> StatusResult<CredentialStatus> {
    let raw = match Encoding::detect(vc)? {
        Encoding::CompactJwt(jwt) => {
            let payload = decode_jwt_payload(jwt)?;
            payload
                .get(CREDENTIAL_STATUS)
                .or_else(|| payload.get("vc").and_then(|v| v.get(CREDENTIAL_STATUS)))
                .cloned()
        }
        Encoding::JsonLd(m) => m.get(CREDENTIAL_STATUS).cloned(),
    }
    .ok_or_else(|| Error::MalformedCredential("no credentialStatus present".to_string()))?;

    let status = select_entry(raw)?;
    debug!("Credential Status: {:?}", status);
    Ok(status)
}

fn select_entry(raw: Value) -> StatusResult<CredentialStatus> {
    match raw {
        Value::Array(entries) => entries
            .into_iter()
            .find_map(|e| serde_json::from_value::<CredentialStatus>(e).ok())
            .ok_or_else(|| {
                Error::MalformedCredential(
                    "no BFCStatusEntry revocation entry in credentialStatus".to_string(),
                )
            }),
        entry => serde_json::from_value(entry)
            .map_err(|e| Error::MalformedCredential(format!("credentialStatus: {}", e))),
    }
}
