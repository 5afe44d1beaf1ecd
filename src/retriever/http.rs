use super::ProviderResult;
use crate::error::ProviderError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Send a request and parse a JSON body, mapping every failure to a provider error
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> ProviderResult<T> {
    let response = request
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(ProviderError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::from_status(status.as_u16()));
    }

    let body = response.text().await.map_err(ProviderError::from_reqwest)?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Malformed(format!("failed to parse response: {}", e)))
}

/// Parse a `0x` prefixed hex quantity
pub(crate) fn parse_quantity(s: &str) -> ProviderResult<u64> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::Malformed(format!("quantity without 0x: {}", s)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::Malformed(format!("bad quantity {}: {}", s, e)))
}

/// Parse a decimal number carried as a string
pub(crate) fn parse_decimal(s: &str) -> ProviderResult<u64> {
    s.parse()
        .map_err(|e| ProviderError::Malformed(format!("bad number {}: {}", s, e)))
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// A JSON-RPC 2.0 endpoint
#[derive(Clone, Debug)]
pub(crate) struct JsonRpcClient {
    client: reqwest::Client,
    endpoint: String,
}

impl JsonRpcClient {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    /// Call `method`; a `null` result is reported as not found
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> ProviderResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response: JsonRpcResponse<T> =
            send_json(self.client.post(&self.endpoint).json(&request)).await?;
        if let Some(error) = response.error {
            return Err(match error.code {
                // the rate limit code shared by the hosted node providers
                429 | -32005 => ProviderError::RateLimited,
                code => ProviderError::Rpc {
                    code,
                    message: error.message,
                },
            });
        }
        response
            .result
            .ok_or_else(|| ProviderError::NotFound(format!("{} returned null", method)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x10").unwrap(), 16);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(parse_quantity("10").is_err());
        assert!(parse_quantity("0xzz").is_err());
        assert_eq!(parse_decimal("7216543").unwrap(), 7_216_543);
        assert!(parse_decimal("0x10").is_err());
    }

    #[tokio::test]
    async fn rpc_result_and_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x2a" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getTransactionByHash" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": null })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_chainId" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": { "code": -32005, "message": "daily request count exceeded" }
            })))
            .mount(&server)
            .await;

        let rpc = JsonRpcClient::new(reqwest::Client::new(), server.uri());
        let n: String = rpc.call("eth_blockNumber", json!([])).await.unwrap();
        assert_eq!(n, "0x2a");
        let missing = rpc
            .call::<Value>("eth_getTransactionByHash", json!(["0x00"]))
            .await;
        assert!(matches!(missing, Err(ProviderError::NotFound(_))));
        let limited = rpc.call::<String>("eth_chainId", json!([])).await;
        assert_eq!(limited, Err(ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn http_failures_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        let res = send_json::<Value>(reqwest::Client::new().get(server.uri())).await;
        assert_eq!(res, Err(ProviderError::RateLimited));

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        let res = send_json::<Value>(reqwest::Client::new().get(server.uri())).await;
        assert!(matches!(res, Err(ProviderError::Malformed(_))));
    }
}
