mod blobscan;
mod http;
mod moralis;
mod node;
mod transfers;

pub use blobscan::*;
pub use moralis::*;
pub use node::*;
pub use transfers::*;

use crate::{
    address::Address,
    config::ApiConfig,
    error::{Error, ProviderAttempt, ProviderError},
    StatusResult,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use std::{collections::HashSet, time::Duration};

/// The result of a single provider request
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A transaction sent by the publisher, as reported by an indexer.
///
/// Indexers that know the blob hashes or the position in the block fill them
/// in; the rest is completed by a [`TransactionLookup`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionRef {
    /// The transaction hash
    pub hash: String,
    /// The block the transaction was included in
    pub block_number: u64,
    /// The position within the block
    pub transaction_index: Option<u64>,
    /// EIP-4844 versioned hashes, `Some(vec![])` for a transaction without blobs
    pub blob_versioned_hashes: Option<Vec<String>>,
}

/// The inclusion details of a mined transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobTransaction {
    /// The transaction hash
    pub hash: String,
    /// The block the transaction was included in
    pub block_number: u64,
    /// The position within the block
    pub transaction_index: u64,
    /// EIP-4844 versioned hashes, empty for an ordinary transaction
    pub blob_versioned_hashes: Vec<String>,
}

/// The payload of the publisher's latest blob
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedBlob {
    /// Hex encoded blob data
    pub data: String,
    /// The provider that located the transaction
    pub provider: &'static str,
    /// The transaction carrying the blob
    pub transaction: BlobTransaction,
}

/// Finds the publisher's recent transactions
#[async_trait]
pub trait TransactionLocator: Send + Sync {
    /// The name used in logs and error reports
    fn name(&self) -> &'static str;
    /// Up to `limit` transactions sent by `address`, in any order
    async fn recent_transactions(
        &self,
        address: &Address,
        limit: usize,
    ) -> ProviderResult<Vec<TransactionRef>>;
}

/// Fetches inclusion details for a transaction hash
#[async_trait]
pub trait TransactionLookup: Send + Sync {
    /// The name used in logs and error reports
    fn name(&self) -> &'static str;
    /// The mined transaction with `hash`
    async fn transaction(&self, hash: &str) -> ProviderResult<BlobTransaction>;
}

/// Serves blob contents by versioned hash
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The name used in logs and error reports
    fn name(&self) -> &'static str;
    /// Hex encoded data of the blob with `versioned_hash`
    async fn blob_data(&self, versioned_hash: &str) -> ProviderResult<String>;
}

/// Anything that can produce a publisher's latest blob
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// The most recent blob published by `publisher`
    async fn latest_blob(&self, publisher: &Address) -> StatusResult<RetrievedBlob>;
}

/// Retrieves the latest blob with ordered provider fallback.
///
/// Locators are tried in the order they were added. A locator's candidates
/// are completed through the lookups, and the first blob of the newest
/// blob carrying transaction is fetched from the stores. Every failed
/// request is recorded, and all of them are reported if nothing succeeds.
pub struct BlobRetriever {
    locators: Vec<Box<dyn TransactionLocator>>,
    lookups: Vec<Box<dyn TransactionLookup>>,
    stores: Vec<Box<dyn BlobStore>>,
    transaction_window: usize,
    deadline: Duration,
}

impl BlobRetriever {
    /// An empty retriever with the default deadline and window
    pub fn new() -> Self {
        let defaults = ApiConfig::default();
        Self {
            locators: Vec::new(),
            lookups: Vec::new(),
            stores: Vec::new(),
            transaction_window: defaults.transaction_window(),
            deadline: defaults.deadline(),
        }
    }

    /// Wire up every provider present in `config`, in priority order:
    /// indexer, secondary indexer and Blobscan to locate transactions, the
    /// node provider then the secondary indexer to look them up, and
    /// Blobscan for blob contents.
    pub fn from_config(config: &ApiConfig) -> StatusResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.provider_timeout())
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let mut retriever = Self::new()
            .with_deadline(config.deadline())
            .with_transaction_window(config.transaction_window());

        if let Some(key) = &config.indexer_key {
            let base = config
                .indexer_url
                .as_deref()
                .unwrap_or(MORALIS_API_URL);
            retriever = retriever.with_locator(MoralisIndexer::new(
                client.clone(),
                base,
                key,
                config.network.indexer_chain(),
            ));
        }
        let secondary = config.secondary_indexer_endpoint();
        if let Some(endpoint) = &secondary {
            retriever = retriever.with_locator(AssetTransfersIndexer::new(
                client.clone(),
                endpoint.clone(),
                "alchemy",
            ));
        }
        if let Some(base) = config.blob_scan_api_root() {
            retriever = retriever
                .with_locator(Blobscan::new(client.clone(), base))
                .with_store(Blobscan::new(client.clone(), base));
        }
        if let Some(endpoint) = config.node_provider_endpoint() {
            retriever = retriever.with_lookup(EthereumNode::new(client.clone(), endpoint, "infura"));
        }
        if let Some(endpoint) = secondary {
            retriever = retriever.with_lookup(EthereumNode::new(client, endpoint, "alchemy"));
        }
        Ok(retriever)
    }

    /// Append a transaction locator
    pub fn with_locator(mut self, locator: impl TransactionLocator + 'static) -> Self {
        self.locators.push(Box::new(locator));
        self
    }

    /// Append a transaction lookup
    pub fn with_lookup(mut self, lookup: impl TransactionLookup + 'static) -> Self {
        self.lookups.push(Box::new(lookup));
        self
    }

    /// Append a blob store
    pub fn with_store(mut self, store: impl BlobStore + 'static) -> Self {
        self.stores.push(Box::new(store));
        self
    }

    /// Bound the whole retrieval
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// How many transactions to ask each locator for
    pub fn with_transaction_window(mut self, window: usize) -> Self {
        self.transaction_window = window.max(1);
        self
    }

    /// Retrieve the most recent blob published by `publisher`
    pub async fn retrieve(&self, publisher: &Address) -> StatusResult<RetrievedBlob> {
        if self.locators.is_empty() {
            return Err(Error::NoProvidersConfigured(
                "no indexer or blob explorer can locate transactions",
            ));
        }
        if self.stores.is_empty() {
            return Err(Error::NoProvidersConfigured(
                "no blob explorer can serve blob data",
            ));
        }

        let mut attempts = Vec::new();
        let outcome =
            tokio::time::timeout(self.deadline, self.run(publisher, &mut attempts)).await;
        match outcome {
            Ok(Some(blob)) => {
                info!(
                    "Retrieved blob of {} from {} in tx {} (block {})",
                    publisher, blob.provider, blob.transaction.hash, blob.transaction.block_number
                );
                Ok(blob)
            }
            Ok(None) => Err(Error::AllProvidersFailed(attempts)),
            Err(_) => {
                warn!(
                    "Blob retrieval for {} exceeded {:?} after {} failed attempts",
                    publisher,
                    self.deadline,
                    attempts.len()
                );
                Err(Error::DeadlineExceeded {
                    deadline: self.deadline,
                    attempts,
                })
            }
        }
    }

    async fn run(
        &self,
        publisher: &Address,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Option<RetrievedBlob> {
        let mut failed_blobs = HashSet::new();
        for locator in &self.locators {
            let Some(transaction) = self.locate(locator.as_ref(), publisher, attempts).await
            else {
                continue;
            };
            let versioned_hash = &transaction.blob_versioned_hashes[0];
            if failed_blobs.contains(versioned_hash) {
                continue;
            }
            let fetched = self.fetch(versioned_hash, attempts).await;
            match fetched {
                Some(data) => {
                    return Some(RetrievedBlob {
                        data,
                        provider: locator.name(),
                        transaction,
                    })
                }
                None => {
                    failed_blobs.insert(versioned_hash.clone());
                }
            }
        }
        None
    }

    /// The newest blob carrying transaction `locator` knows about
    async fn locate(
        &self,
        locator: &dyn TransactionLocator,
        publisher: &Address,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Option<BlobTransaction> {
        let mut candidates = match locator
            .recent_transactions(publisher, self.transaction_window)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                record(attempts, locator.name(), e);
                return None;
            }
        };
        debug!(
            "{} reported {} transactions from {}",
            locator.name(),
            candidates.len(),
            publisher
        );
        candidates.sort_by(|a, b| {
            (b.block_number, b.transaction_index).cmp(&(a.block_number, a.transaction_index))
        });

        let mut latest: Option<BlobTransaction> = None;
        for candidate in candidates {
            if let Some(found) = &latest {
                if candidate.block_number < found.block_number {
                    break;
                }
            }
            let hash = candidate.hash.clone();
            let completed = self.complete(candidate, attempts).await;
            let Some(transaction) = completed else {
                record(
                    attempts,
                    locator.name(),
                    ProviderError::NotFound(format!("no lookup could resolve {}", hash)),
                );
                return None;
            };
            if transaction.blob_versioned_hashes.is_empty() {
                continue;
            }
            let newer = latest.as_ref().map_or(true, |found| {
                (transaction.block_number, transaction.transaction_index)
                    > (found.block_number, found.transaction_index)
            });
            if newer {
                latest = Some(transaction);
            }
        }
        if latest.is_none() {
            record(
                attempts,
                locator.name(),
                ProviderError::NotFound(format!("no blob transaction from {}", publisher)),
            );
        }
        latest
    }

    /// Fill in what the locator left out
    async fn complete(
        &self,
        candidate: TransactionRef,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Option<BlobTransaction> {
        if let (Some(hashes), Some(index)) =
            (&candidate.blob_versioned_hashes, candidate.transaction_index)
        {
            return Some(BlobTransaction {
                hash: candidate.hash,
                block_number: candidate.block_number,
                transaction_index: index,
                blob_versioned_hashes: hashes.clone(),
            });
        }
        for lookup in &self.lookups {
            match lookup.transaction(&candidate.hash).await {
                Ok(transaction) => return Some(transaction),
                Err(e) => record(attempts, lookup.name(), e),
            }
        }
        // the position only breaks ties within a block
        let hashes = candidate.blob_versioned_hashes?;
        Some(BlobTransaction {
            hash: candidate.hash,
            block_number: candidate.block_number,
            transaction_index: 0,
            blob_versioned_hashes: hashes,
        })
    }

    async fn fetch(
        &self,
        versioned_hash: &str,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Option<String> {
        for store in &self.stores {
            match store.blob_data(versioned_hash).await {
                Ok(data) if !data.trim().is_empty() => return Some(data),
                Ok(_) => record(
                    attempts,
                    store.name(),
                    ProviderError::Malformed(format!("blob {} is empty", versioned_hash)),
                ),
                Err(e) => record(attempts, store.name(), e),
            }
        }
        None
    }
}

impl Default for BlobRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobSource for BlobRetriever {
    async fn latest_blob(&self, publisher: &Address) -> StatusResult<RetrievedBlob> {
        self.retrieve(publisher).await
    }
}

fn record(attempts: &mut Vec<ProviderAttempt>, provider: &'static str, error: ProviderError) {
    warn!("Provider {} failed: {}", provider, error);
    attempts.push(ProviderAttempt::new(provider, error));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    const PUBLISHER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn publisher() -> Address {
        PUBLISHER.parse().unwrap()
    }

    fn tx(hash: &str, block: u64, index: Option<u64>, blobs: Option<&[&str]>) -> TransactionRef {
        TransactionRef {
            hash: hash.to_string(),
            block_number: block,
            transaction_index: index,
            blob_versioned_hashes: blobs.map(|b| b.iter().map(|s| s.to_string()).collect()),
        }
    }

    struct FakeLocator {
        name: &'static str,
        result: ProviderResult<Vec<TransactionRef>>,
        calls: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    impl FakeLocator {
        fn new(name: &'static str, result: ProviderResult<Vec<TransactionRef>>) -> Self {
            Self {
                name,
                result,
                calls: Arc::new(AtomicUsize::new(0)),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl TransactionLocator for FakeLocator {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn recent_transactions(
            &self,
            _address: &Address,
            _limit: usize,
        ) -> ProviderResult<Vec<TransactionRef>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result.clone()
        }
    }

    struct FakeLookup {
        name: &'static str,
        known: HashMap<String, BlobTransaction>,
    }

    #[async_trait]
    impl TransactionLookup for FakeLookup {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn transaction(&self, hash: &str) -> ProviderResult<BlobTransaction> {
            self.known
                .get(hash)
                .cloned()
                .ok_or_else(|| ProviderError::NotFound(hash.to_string()))
        }
    }

    struct FakeStore {
        name: &'static str,
        blobs: HashMap<String, String>,
        requested: Arc<Mutex<Vec<String>>>,
    }

    impl FakeStore {
        fn new(name: &'static str, blobs: &[(&str, &str)]) -> Self {
            Self {
                name,
                blobs: blobs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                requested: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl BlobStore for FakeStore {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn blob_data(&self, versioned_hash: &str) -> ProviderResult<String> {
            self.requested
                .lock()
                .unwrap()
                .push(versioned_hash.to_string());
            self.blobs
                .get(versioned_hash)
                .cloned()
                .ok_or(ProviderError::Status(503))
        }
    }

    #[tokio::test]
    async fn newest_blob_transaction_wins() {
        let store = FakeStore::new("store", &[("0x01aa", "0xaa"), ("0x01bb", "0xbb"), ("0x01cc", "0xcc")]);
        let requested = store.requested.clone();
        let retriever = BlobRetriever::new()
            .with_locator(FakeLocator::new(
                "indexer",
                Ok(vec![
                    tx("0xold", 90, Some(0), Some(&["0x01aa"])),
                    tx("0xlow", 100, Some(1), Some(&["0x01bb"])),
                    tx("0xhigh", 100, Some(7), Some(&["0x01cc", "0x01dd"])),
                    tx("0xplain", 101, Some(0), Some(&[])),
                ]),
            ))
            .with_store(store);

        let blob = retriever.retrieve(&publisher()).await.unwrap();
        assert_eq!(blob.data, "0xcc");
        assert_eq!(blob.provider, "indexer");
        assert_eq!(blob.transaction.hash, "0xhigh");
        assert_eq!(blob.transaction.block_number, 100);
        assert_eq!(*requested.lock().unwrap(), vec!["0x01cc".to_string()]);
    }

    #[tokio::test]
    async fn lookups_complete_candidates() {
        let mut known = HashMap::new();
        known.insert(
            "0xabc".to_string(),
            BlobTransaction {
                hash: "0xabc".to_string(),
                block_number: 5,
                transaction_index: 2,
                blob_versioned_hashes: vec!["0x01ff".to_string()],
            },
        );
        let retriever = BlobRetriever::new()
            .with_locator(FakeLocator::new("indexer", Ok(vec![tx("0xabc", 5, None, None)])))
            .with_lookup(FakeLookup {
                name: "node-a",
                known: HashMap::new(),
            })
            .with_lookup(FakeLookup {
                name: "node-b",
                known,
            })
            .with_store(FakeStore::new("store", &[("0x01ff", "0x00")]));

        let blob = retriever.retrieve(&publisher()).await.unwrap();
        assert_eq!(blob.transaction.transaction_index, 2);
        assert_eq!(blob.data, "0x00");
    }

    #[tokio::test]
    async fn falls_back_in_order_and_skips_later_providers() {
        let third = FakeLocator::new("third", Ok(vec![tx("0x3", 1, Some(0), Some(&["0x0133"]))]));
        let third_calls = third.calls.clone();
        let retriever = BlobRetriever::new()
            .with_locator(FakeLocator::new("first", Err(ProviderError::Status(500))))
            .with_locator(FakeLocator::new("second", Ok(vec![tx("0x2", 1, Some(0), Some(&["0x0122"]))])))
            .with_locator(third)
            .with_store(FakeStore::new("store", &[("0x0122", "0x22"), ("0x0133", "0x33")]));

        let blob = retriever.retrieve(&publisher()).await.unwrap();
        assert_eq!(blob.provider, "second");
        assert_eq!(blob.data, "0x22");
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn aggregates_every_failure() {
        let retriever = BlobRetriever::new()
            .with_locator(FakeLocator::new("first", Err(ProviderError::RateLimited)))
            .with_locator(FakeLocator::new("second", Ok(vec![tx("0x2", 1, Some(0), Some(&[]))])))
            .with_locator(FakeLocator::new("third", Ok(vec![tx("0x3", 1, Some(0), Some(&["0x0133"]))])))
            .with_store(FakeStore::new("store", &[]));

        match retriever.retrieve(&publisher()).await {
            Err(Error::AllProvidersFailed(attempts)) => {
                let names: Vec<_> = attempts.iter().map(|a| a.provider).collect();
                assert_eq!(names, vec!["first", "second", "store"]);
                assert_eq!(attempts[0].error, ProviderError::RateLimited);
                assert!(matches!(attempts[1].error, ProviderError::NotFound(_)));
                assert_eq!(attempts[2].error, ProviderError::Status(503));
            }
            other => panic!("expected aggregate failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_blob_is_not_fetched_twice() {
        let store = FakeStore::new("store", &[]);
        let requested = store.requested.clone();
        let same = || Ok(vec![tx("0x1", 1, Some(0), Some(&["0x0111"]))]);
        let retriever = BlobRetriever::new()
            .with_locator(FakeLocator::new("first", same()))
            .with_locator(FakeLocator::new("second", same()))
            .with_store(store);
        assert!(retriever.retrieve(&publisher()).await.is_err());
        assert_eq!(requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_retriever_fails_fast() {
        let err = BlobRetriever::new().retrieve(&publisher()).await.unwrap_err();
        assert!(matches!(err, Error::NoProvidersConfigured(_)));

        let only_locator = BlobRetriever::new().with_locator(FakeLocator::new("first", Ok(vec![])));
        let err = only_locator.retrieve(&publisher()).await.unwrap_err();
        assert!(matches!(err, Error::NoProvidersConfigured(_)));
    }

    #[tokio::test]
    async fn deadline_keeps_completed_attempts() {
        let mut slow = FakeLocator::new("slow", Ok(vec![]));
        slow.delay = Some(Duration::from_secs(30));
        let retriever = BlobRetriever::new()
            .with_locator(FakeLocator::new("first", Err(ProviderError::Timeout)))
            .with_locator(slow)
            .with_store(FakeStore::new("store", &[]))
            .with_deadline(Duration::from_millis(50));

        match retriever.retrieve(&publisher()).await {
            Err(Error::DeadlineExceeded { deadline, attempts }) => {
                assert_eq!(deadline, Duration::from_millis(50));
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].provider, "first");
            }
            other => panic!("expected deadline, got {:?}", other),
        }
    }

    #[test]
    fn empty_config_builds() {
        let retriever = BlobRetriever::from_config(&ApiConfig::default()).unwrap();
        assert!(retriever.locators.is_empty());
        assert!(retriever.lookups.is_empty());
        assert!(retriever.stores.is_empty());
    }

    #[test]
    fn config_wires_providers_in_priority_order() {
        let config = ApiConfig {
            node_provider_key: Some("a".to_string()),
            indexer_key: Some("b".to_string()),
            secondary_indexer_key: Some("c".to_string()),
            blob_scan_base_url: Some("https://api.sepolia.blobscan.com".to_string()),
            ..ApiConfig::default()
        };
        let retriever = BlobRetriever::from_config(&config).unwrap();
        let locators: Vec<_> = retriever.locators.iter().map(|l| l.name()).collect();
        assert_eq!(locators, vec!["moralis", "alchemy", "blobscan"]);
        let lookups: Vec<_> = retriever.lookups.iter().map(|l| l.name()).collect();
        assert_eq!(lookups, vec!["infura", "alchemy"]);
        assert_eq!(retriever.stores.len(), 1);
    }
}
