use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Errors created by this library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The credential is neither a compact JWT nor a JSON-LD object, or it
    /// carries no usable credential status
    #[error("malformed credential: {0}")]
    MalformedCredential(String),
    /// The status identifier contains no valid blockchain address
    #[error("invalid Ethereum address: {0}")]
    InvalidAddress(String),
    /// No blob provider could be attempted with the given configuration
    #[error("no blob provider configured: {0}")]
    NoProvidersConfigured(&'static str),
    /// Every configured blob provider failed
    #[error("all blob providers failed: {}", ProviderAttempts(.0))]
    AllProvidersFailed(Vec<ProviderAttempt>),
    /// The retrieval deadline elapsed before any provider succeeded
    #[error("blob retrieval exceeded {deadline:?}: {}", ProviderAttempts(.attempts))]
    DeadlineExceeded {
        /// The configured deadline
        deadline: Duration,
        /// The attempts that completed before the deadline
        attempts: Vec<ProviderAttempt>,
    },
    /// The blob payload could not be decoded as a bloom filter cascade
    #[error("corrupt bloom filter cascade: {0}")]
    CorruptCascade(String),
    /// A configuration value could not be parsed
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The HTTP client could not be constructed
    #[error("http client error: {0}")]
    Http(String),
}

/// A failure reported by a single blob data provider
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Transport level failure
    #[error("network error: {0}")]
    Network(String),
    /// The provider did not answer within the per-provider timeout
    #[error("request timed out")]
    Timeout,
    /// The provider throttled the request
    #[error("rate limited")]
    RateLimited,
    /// The provider answered with an unexpected HTTP status
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    /// The provider answered with a body that could not be understood
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The provider has nothing for the request
    #[error("not found: {0}")]
    NotFound(String),
    /// A JSON-RPC endpoint reported an error object
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// The JSON-RPC error code
        code: i64,
        /// The JSON-RPC error message
        message: String,
    },
}

impl ProviderError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_status(status.as_u16())
        } else {
            Self::Network(e.to_string())
        }
    }

    pub(crate) fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound("HTTP 404".to_string()),
            429 => Self::RateLimited,
            s => Self::Status(s),
        }
    }
}

/// One failed attempt against a named provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderAttempt {
    /// The provider name
    pub provider: &'static str,
    /// Why it failed
    pub error: ProviderError,
}

impl ProviderAttempt {
    pub(crate) fn new(provider: &'static str, error: ProviderError) -> Self {
        Self { provider, error }
    }
}

impl Display for ProviderAttempt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

struct ProviderAttempts<'a>(&'a [ProviderAttempt]);

impl Display for ProviderAttempts<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no attempts made");
        }
        let mut sep = "";
        for a in self.0 {
            write!(f, "{}[{}]", sep, a)?;
            sep = ", ";
        }
        Ok(())
    }
}
