use super::{
    http::{parse_quantity, JsonRpcClient},
    BlobTransaction, ProviderResult, TransactionLookup,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: String,
    block_number: Option<String>,
    transaction_index: Option<String>,
    #[serde(default)]
    blob_versioned_hashes: Vec<String>,
}

/// An Ethereum JSON-RPC node, queried with `eth_getTransactionByHash`
#[derive(Clone, Debug)]
pub struct EthereumNode {
    rpc: JsonRpcClient,
    name: &'static str,
}

impl EthereumNode {
    /// A node at `endpoint`, the full URL including any key
    pub fn new(client: reqwest::Client, endpoint: String, name: &'static str) -> Self {
        Self {
            rpc: JsonRpcClient::new(client, endpoint),
            name,
        }
    }
}

#[async_trait]
impl TransactionLookup for EthereumNode {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn transaction(&self, hash: &str) -> ProviderResult<BlobTransaction> {
        let tx: RpcTransaction = self
            .rpc
            .call("eth_getTransactionByHash", json!([hash]))
            .await?;
        let (Some(block), Some(index)) = (&tx.block_number, &tx.transaction_index) else {
            return Err(ProviderError::NotFound(format!("{} is pending", hash)));
        };
        Ok(BlobTransaction {
            block_number: parse_quantity(block)?,
            transaction_index: parse_quantity(index)?,
            hash: tx.hash,
            blob_versioned_hashes: tx.blob_versioned_hashes,
        })
    }
}
