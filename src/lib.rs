//! Revocation checks for verifiable credentials whose status is published
//! as a bloom filter cascade inside EIP-4844 blobs.
//!
//! A check reads the `credentialStatus` entry of a credential, resolves the
//! publisher address and revocation index from its id, retrieves the newest
//! blob the publisher posted, decodes the cascade it carries and tests the
//! index against it.
//!
//! ```no_run
//! use bfc_status::prelude::*;
//!
//! # async fn check(vc: serde_json::Value) -> StatusResult<()> {
//! let config = ApiConfig {
//!     blob_scan_base_url: Some("https://api.sepolia.blobscan.com".to_string()),
//!     ..ApiConfig::default()
//! };
//! let revoked = is_revoked(&vc, &config, None).await?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Ethereum addresses
pub mod address;
/// Bloom filter cascade decoding and membership
pub mod cascade;
/// The revocation check pipeline
pub mod checker;
/// Provider credentials and retrieval limits
pub mod config;
/// Errors
pub mod error;
/// Pipeline progress events
pub mod progress;
/// Blob retrieval with provider fallback
pub mod retriever;
/// Credential status extraction and identifier resolution
pub mod status;

/// The result type used throughout this crate
pub type StatusResult<T> = Result<T, error::Error>;

/// Re-exports for convenience
pub mod prelude {
    pub use super::address::Address;
    pub use super::cascade::{BloomCascade, Cascade, CascadeCodec, FilterLayer};
    pub use super::checker::{is_revoked, RevocationChecker};
    pub use super::config::{ApiConfig, Network};
    pub use super::error::{Error, ProviderAttempt, ProviderError};
    pub use super::progress::{
        progress_channel, ProgressEvent, ProgressObserver, StatusCheckOptions, Step, StepMetrics,
        StepStatus,
    };
    pub use super::retriever::{BlobRetriever, BlobSource, RetrievedBlob};
    pub use super::status::{extract_credential_status, CredentialStatus, ResolvedIdentifier};
    pub use super::StatusResult;
}
