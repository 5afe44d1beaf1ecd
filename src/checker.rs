use crate::{
    cascade::{check_revocation, reconstruct, BloomCascade, CascadeCodec},
    config::ApiConfig,
    progress::{Reporter, StatusCheckOptions, Step, StepMetrics},
    retriever::{BlobRetriever, BlobSource},
    status::extract_credential_status,
    StatusResult,
};
use log::info;
use serde_json::Value;

/// Checks credentials against the revocation cascade their publisher posts.
///
/// A checker holds no per call state. The same instance can serve any number
/// of concurrent checks.
pub struct RevocationChecker<C = BloomCascade, S = BlobRetriever> {
    codec: C,
    source: S,
}

impl RevocationChecker {
    /// A checker using the reference cascade codec and every provider in `config`
    pub fn from_config(config: &ApiConfig) -> StatusResult<Self> {
        Ok(Self::new(BloomCascade, BlobRetriever::from_config(config)?))
    }
}

impl<C: CascadeCodec, S: BlobSource> RevocationChecker<C, S> {
    /// A checker decoding with `codec` and retrieving from `source`
    pub fn new(codec: C, source: S) -> Self {
        Self { codec, source }
    }

    /// Is the credential revoked.
    ///
    /// `vc` is either a compact JWT string or a JSON-LD object. Progress is
    /// reported through `options` when given; it never changes the outcome.
    pub async fn is_revoked(
        &self,
        vc: &Value,
        options: Option<&StatusCheckOptions>,
    ) -> StatusResult<bool> {
        let reporter = Reporter::new(options);

        reporter.started(Step::ExtractPublisherAddress);
        let status = extract_credential_status(vc)?;
        let resolved = status.resolve()?;
        reporter.completed(
            Step::ExtractPublisherAddress,
            StepMetrics::Address {
                address: resolved.publisher,
            },
        );

        reporter.started(Step::RetrieveBlobData);
        let blob = self.source.latest_blob(&resolved.publisher).await?;
        reporter.completed(
            Step::RetrieveBlobData,
            StepMetrics::Blob {
                provider: blob.provider.to_string(),
                transaction_hash: blob.transaction.hash.clone(),
                block_number: blob.transaction.block_number,
            },
        );

        reporter.started(Step::ReconstructBfc);
        let cascade = reconstruct(&self.codec, &blob.data)?;
        reporter.completed(
            Step::ReconstructBfc,
            StepMetrics::LevelCount {
                level_count: cascade.level_count(),
            },
        );

        reporter.started(Step::CheckRevocation);
        let is_revoked = check_revocation(&self.codec, &cascade, &resolved.revocation_index);
        reporter.completed(Step::CheckRevocation, StepMetrics::Verdict { is_revoked });

        info!(
            "Credential status {} checked against blob {}: revoked = {}",
            status.id, blob.transaction.hash, is_revoked
        );
        Ok(is_revoked)
    }
}

/// Check a credential with a checker built from `config`
pub async fn is_revoked(
    vc: &Value,
    config: &ApiConfig,
    options: Option<&StatusCheckOptions>,
) -> StatusResult<bool> {
    RevocationChecker::from_config(config)?
        .is_revoked(vc, options)
        .await
}
