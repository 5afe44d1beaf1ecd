use super::{http::send_json, BlobStore, ProviderResult, TransactionLocator, TransactionRef};
use crate::address::Address;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobRef {
    versioned_hash: String,
    #[serde(default)]
    index: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobscanTransaction {
    hash: String,
    #[serde(default)]
    from: String,
    block_number: u64,
    #[serde(alias = "transactionIndex")]
    index: Option<u64>,
    #[serde(default)]
    blobs: Vec<BlobRef>,
}

#[derive(Debug, Deserialize)]
struct TransactionsPage {
    #[serde(default)]
    transactions: Vec<BlobscanTransaction>,
}

#[derive(Debug, Deserialize)]
struct BlobBody {
    data: Option<String>,
}

/// A Blobscan style blob explorer.
///
/// It indexes only blob carrying transactions and keeps the blob contents,
/// so it serves as both locator and store.
#[derive(Clone, Debug)]
pub struct Blobscan {
    client: reqwest::Client,
    base_url: String,
}

impl Blobscan {
    /// An explorer whose API is rooted at `base_url`
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TransactionLocator for Blobscan {
    fn name(&self) -> &'static str {
        "blobscan"
    }

    async fn recent_transactions(
        &self,
        address: &Address,
        limit: usize,
    ) -> ProviderResult<Vec<TransactionRef>> {
        let sender = address.to_lower_hex();
        let page: TransactionsPage = send_json(
            self.client
                .get(format!("{}/transactions", self.base_url))
                .query(&[
                    ("from", sender.clone()),
                    ("sort", "desc".to_string()),
                    ("ps", limit.to_string()),
                ]),
        )
        .await?;

        // the explorer's sender filter is not trusted
        Ok(page
            .transactions
            .into_iter()
            .filter(|tx| tx.from.eq_ignore_ascii_case(&sender))
            .map(|mut tx| {
                tx.blobs.sort_by_key(|b| b.index);
                TransactionRef {
                    hash: tx.hash,
                    block_number: tx.block_number,
                    transaction_index: tx.index,
                    blob_versioned_hashes: Some(
                        tx.blobs.into_iter().map(|b| b.versioned_hash).collect(),
                    ),
                }
            })
            .collect())
    }
}

#[async_trait]
impl BlobStore for Blobscan {
    fn name(&self) -> &'static str {
        "blobscan"
    }

    async fn blob_data(&self, versioned_hash: &str) -> ProviderResult<String> {
        let url = format!("{}/blobs/{}", self.base_url, versioned_hash);
        let blob: BlobBody = send_json(self.client.get(&url)).await?;
        if let Some(data) = blob.data {
            return Ok(data);
        }
        // some deployments keep the contents behind a separate endpoint
        debug!("Blob {} has no inline data, fetching it separately", versioned_hash);
        send_json(self.client.get(format!("{}/data", url))).await
    }
}
