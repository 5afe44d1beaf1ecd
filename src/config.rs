use crate::{error::Error, StatusResult};
use serde::{Deserialize, Serialize};
use std::{env, time::Duration};

const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_DEADLINE_MS: u64 = 60_000;
const DEFAULT_TRANSACTION_WINDOW: usize = 25;

/// The Ethereum network the publisher posts blobs to
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Ethereum mainnet
    Mainnet,
    /// The Sepolia testnet
    #[default]
    Sepolia,
}

impl Network {
    /// The EIP-155 chain id
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Sepolia => 11_155_111,
        }
    }

    /// The chain name the indexing provider expects
    pub fn indexer_chain(&self) -> &'static str {
        match self {
            Self::Mainnet => "eth",
            Self::Sepolia => "sepolia",
        }
    }

    pub(crate) fn node_provider_base(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://mainnet.infura.io/v3",
            Self::Sepolia => "https://sepolia.infura.io/v3",
        }
    }

    pub(crate) fn secondary_indexer_base(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://eth-mainnet.g.alchemy.com/v2",
            Self::Sepolia => "https://eth-sepolia.g.alchemy.com/v2",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "1" => Ok(Self::Mainnet),
            "sepolia" | "11155111" => Ok(Self::Sepolia),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

/// Credentials and endpoints for the blob data providers.
///
/// Every provider is optional; retrieval uses whichever are present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Key for the Ethereum node provider (Infura style JSON-RPC)
    #[serde(alias = "infuraApiKey")]
    pub node_provider_key: Option<String>,
    /// Key for the transaction indexing provider (Moralis style REST)
    #[serde(alias = "moralisApiKey")]
    pub indexer_key: Option<String>,
    /// Key for the secondary indexing provider (Alchemy style JSON-RPC)
    #[serde(alias = "alchemyApiKey")]
    pub secondary_indexer_key: Option<String>,
    /// Base URL of a Blobscan style API, e.g. `https://api.sepolia.blobscan.com`.
    /// A blob endpoint such as `https://api.sepolia.blobscan.com/blob` is
    /// accepted too.
    #[serde(alias = "blobScanUrl")]
    pub blob_scan_base_url: Option<String>,
    /// The network to query
    pub network: Network,
    /// Replaces the node provider endpoint; the key is appended as a path segment
    pub node_provider_url: Option<String>,
    /// Replaces the indexing provider endpoint
    pub indexer_url: Option<String>,
    /// Replaces the secondary indexing provider endpoint; the key is appended as a path segment
    pub secondary_indexer_url: Option<String>,
    /// Per request timeout in milliseconds
    pub provider_timeout_ms: Option<u64>,
    /// Overall retrieval deadline in milliseconds
    pub deadline_ms: Option<u64>,
    /// How many recent transactions each indexer is asked for
    pub transaction_window: Option<usize>,
}

impl ApiConfig {
    /// Read the configuration from `BFC_*` environment variables.
    ///
    /// - `BFC_NODE_PROVIDER_KEY`
    /// - `BFC_INDEXER_KEY`
    /// - `BFC_SECONDARY_INDEXER_KEY`
    /// - `BFC_BLOB_SCAN_URL`
    /// - `BFC_NETWORK` (`mainnet` or `sepolia`)
    /// - `BFC_PROVIDER_TIMEOUT_MS`, `BFC_DEADLINE_MS`
    pub fn from_env() -> StatusResult<Self> {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        let parse_ms = |name: &str| -> StatusResult<Option<u64>> {
            var(name)
                .map(|v| {
                    v.parse::<u64>()
                        .map_err(|e| Error::Config(format!("{}: {}", name, e)))
                })
                .transpose()
        };
        Ok(Self {
            node_provider_key: var("BFC_NODE_PROVIDER_KEY"),
            indexer_key: var("BFC_INDEXER_KEY"),
            secondary_indexer_key: var("BFC_SECONDARY_INDEXER_KEY"),
            blob_scan_base_url: var("BFC_BLOB_SCAN_URL"),
            network: var("BFC_NETWORK")
                .map(|n| {
                    n.parse::<Network>()
                        .map_err(|e| Error::Config(format!("BFC_NETWORK: {}", e)))
                })
                .transpose()?
                .unwrap_or_default(),
            provider_timeout_ms: parse_ms("BFC_PROVIDER_TIMEOUT_MS")?,
            deadline_ms: parse_ms("BFC_DEADLINE_MS")?,
            ..Self::default()
        })
    }

    /// Per request timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(
            self.provider_timeout_ms
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_MS),
        )
    }

    /// Overall retrieval deadline
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms.unwrap_or(DEFAULT_DEADLINE_MS))
    }

    /// Candidate transactions requested per indexer
    pub fn transaction_window(&self) -> usize {
        self.transaction_window
            .unwrap_or(DEFAULT_TRANSACTION_WINDOW)
            .max(1)
    }

    /// The Blobscan API root, with any trailing blob endpoint segment removed
    pub(crate) fn blob_scan_api_root(&self) -> Option<&str> {
        let url = self.blob_scan_base_url.as_deref()?.trim_end_matches('/');
        Some(
            url.strip_suffix("/blobs")
                .or_else(|| url.strip_suffix("/blob"))
                .unwrap_or(url),
        )
    }

    pub(crate) fn node_provider_endpoint(&self) -> Option<String> {
        let key = self.node_provider_key.as_deref()?;
        let base = self
            .node_provider_url
            .as_deref()
            .unwrap_or(self.network.node_provider_base());
        Some(format!("{}/{}", base.trim_end_matches('/'), key))
    }

    pub(crate) fn secondary_indexer_endpoint(&self) -> Option<String> {
        let key = self.secondary_indexer_key.as_deref()?;
        let base = self
            .secondary_indexer_url
            .as_deref()
            .unwrap_or(self.network.secondary_indexer_base());
        Some(format!("{}/{}", base.trim_end_matches('/'), key))
    }
}
