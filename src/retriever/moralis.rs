use super::{
    http::{parse_decimal, send_json},
    ProviderResult, TransactionLocator, TransactionRef,
};
use crate::address::Address;
use async_trait::async_trait;
use serde::Deserialize;

/// The hosted wallet history API
pub const MORALIS_API_URL: &str = "https://deep-index.moralis.io/api/v2.2";

#[derive(Debug, Deserialize)]
struct WalletTransaction {
    hash: String,
    from_address: String,
    block_number: String,
    transaction_index: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WalletHistory {
    #[serde(default)]
    result: Vec<WalletTransaction>,
    cursor: Option<String>,
}

/// Pages of history read while collecting outgoing transactions
const MAX_PAGES: usize = 4;

/// Locates transactions through a Moralis style wallet history REST API.
///
/// The history includes incoming transactions, which are dropped. Pages are
/// followed until `limit` outgoing transactions are found or [`MAX_PAGES`]
/// pages have been read.
#[derive(Clone, Debug)]
pub struct MoralisIndexer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    chain: &'static str,
}

impl MoralisIndexer {
    /// An indexer rooted at `base_url` authenticated with `api_key`
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, chain: &'static str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chain,
        }
    }
}

#[async_trait]
impl TransactionLocator for MoralisIndexer {
    fn name(&self) -> &'static str {
        "moralis"
    }

    async fn recent_transactions(
        &self,
        address: &Address,
        limit: usize,
    ) -> ProviderResult<Vec<TransactionRef>> {
        let sender = address.to_lower_hex();
        let url = format!("{}/{}", self.base_url, sender);
        let page_size = limit.to_string();
        let mut cursor: Option<String> = None;
        let mut out = Vec::new();

        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("chain", self.chain),
                ("order", "DESC"),
                ("limit", page_size.as_str()),
            ];
            if let Some(c) = cursor.as_deref() {
                query.push(("cursor", c));
            }
            let history: WalletHistory = send_json(
                self.client
                    .get(&url)
                    .header("X-API-Key", &self.api_key)
                    .query(&query),
            )
            .await?;

            for tx in history.result {
                if !tx.from_address.eq_ignore_ascii_case(&sender) {
                    continue;
                }
                out.push(TransactionRef {
                    block_number: parse_decimal(&tx.block_number)?,
                    transaction_index: tx
                        .transaction_index
                        .as_deref()
                        .map(parse_decimal)
                        .transpose()?,
                    hash: tx.hash,
                    blob_versioned_hashes: None,
                });
            }
            match history.cursor.filter(|c| !c.is_empty()) {
                Some(next) if out.len() < limit => cursor = Some(next),
                _ => break,
            }
        }
        out.truncate(limit);
        Ok(out)
    }
}
