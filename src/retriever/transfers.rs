use super::{
    http::{parse_quantity, JsonRpcClient},
    ProviderResult, TransactionLocator, TransactionRef,
};
use crate::address::Address;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Transfer {
    hash: String,
    #[serde(default)]
    from: String,
    block_num: String,
}

#[derive(Debug, Deserialize)]
struct TransfersPage {
    #[serde(default)]
    transfers: Vec<Transfer>,
}

/// Locates transactions through the `alchemy_getAssetTransfers` JSON-RPC
/// extension. Transfers carry no blob data, so every candidate needs a lookup.
#[derive(Clone, Debug)]
pub struct AssetTransfersIndexer {
    rpc: JsonRpcClient,
    name: &'static str,
}

impl AssetTransfersIndexer {
    /// An indexer at `endpoint`, the full URL including any key
    pub fn new(client: reqwest::Client, endpoint: String, name: &'static str) -> Self {
        Self {
            rpc: JsonRpcClient::new(client, endpoint),
            name,
        }
    }
}

#[async_trait]
impl TransactionLocator for AssetTransfersIndexer {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn recent_transactions(
        &self,
        address: &Address,
        limit: usize,
    ) -> ProviderResult<Vec<TransactionRef>> {
        let sender = address.to_lower_hex();
        let page: TransfersPage = self
            .rpc
            .call(
                "alchemy_getAssetTransfers",
                json!([{
                    "fromBlock": "0x0",
                    "fromAddress": sender,
                    "category": ["external"],
                    "order": "desc",
                    "withMetadata": false,
                    "excludeZeroValue": false,
                    "maxCount": format!("{:#x}", limit),
                }]),
            )
            .await?;

        // one transaction can carry several transfers
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(page.transfers.len());
        for transfer in page.transfers {
            if !transfer.from.eq_ignore_ascii_case(&sender) || !seen.insert(transfer.hash.clone()) {
                continue;
            }
            out.push(TransactionRef {
                block_number: parse_quantity(&transfer.block_num)?,
                hash: transfer.hash,
                ..TransactionRef::default()
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PUBLISHER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    #[tokio::test]
    async fn outgoing_transfers_become_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "alchemy_getAssetTransfers",
                "params": [{
                    "fromAddress": "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359",
                    "maxCount": "0x19"
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "transfers": [
                        { "hash": "0xcc", "blockNum": "0x11", "from": "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed" },
                        { "hash": "0xaa", "blockNum": "0x10", "from": "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359" },
                        { "hash": "0xaa", "blockNum": "0x10", "from": "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359" },
                        { "hash": "0xbb", "blockNum": "0x0f", "from": "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let indexer = AssetTransfersIndexer::new(reqwest::Client::new(), server.uri(), "alchemy");
        let txs = indexer
            .recent_transactions(&PUBLISHER.parse().unwrap(), 25)
            .await
            .unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].hash, "0xaa");
        assert_eq!(txs[0].block_number, 16);
        assert_eq!(txs[0].blob_versioned_hashes, None);
        assert_eq!(txs[1].block_number, 15);
    }

    #[tokio::test]
    async fn server_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let indexer = AssetTransfersIndexer::new(reqwest::Client::new(), server.uri(), "alchemy");
        let res = indexer
            .recent_transactions(&PUBLISHER.parse().unwrap(), 25)
            .await;
        assert_eq!(res, Err(ProviderError::Status(503)));
    }
}
