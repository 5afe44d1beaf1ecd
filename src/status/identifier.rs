use crate::{address::Address, error::Error, StatusResult};
use log::{debug, warn};
use serde::Serialize;

/// A credential status id split into its meaningful parts
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdentifier {
    /// The address that publishes revocation blobs
    pub publisher: Address,
    /// The identifier tested against the cascade
    pub revocation_index: String,
}

/// Resolve a CAIP-10 style status id such as `eip155:1:0xAbC...:42`.
///
/// The last segment is always the revocation index. The publisher is the
/// first segment that parses as an address.
pub fn resolve_identifier(id: &str) -> StatusResult<ResolvedIdentifier> {
    let segments: Vec<&str> = id.split(':').collect();
    // split always yields at least one segment
    let revocation_index = segments[segments.len() - 1].to_string();

    let mut candidates = segments
        .iter()
        .filter_map(|s| Address::parse(s).ok().map(|a| (*s, a)));
    let (segment, publisher) = candidates
        .next()
        .ok_or_else(|| Error::InvalidAddress(id.to_string()))?;
    if let Some((other, _)) = candidates.next() {
        warn!(
            "status id {} has more than one address segment, using {} and ignoring {}",
            id, segment, other
        );
    }
    debug!(
        "Resolved status id {} to publisher {} index {}",
        id, publisher, revocation_index
    );
    Ok(ResolvedIdentifier {
        publisher,
        revocation_index,
    })
}
