//! Error types for the citation resolution engine.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Each layer owns its enum: transport (`ClientError`), resolver boundary (`ResolveError`),
//! persistent store (`CacheError`) and the engine surface (`CitationError`).

use std::path::PathBuf;
use std::time::Duration;

use crate::models::Tag;

/// Errors from the HTTP client layer.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// Connection, DNS or TLS failure
    #[error("transport failure: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure inside the retry middleware
    #[error("retry middleware: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Provider answered 429
    #[error("provider is throttling requests, back off for {retry_after:?}")]
    RateLimited {
        /// Pause requested through Retry-After
        retry_after: Duration,
    },

    /// Provider answered 404 or 410
    #[error("no such page or record: {resource}")]
    NotFound {
        /// URL or identifier that was looked up
        resource: String,
    },

    /// The site refused automated access (401/403 response)
    #[error("Access blocked ({status}) for {url}")]
    Blocked {
        /// HTTP status code
        status: u16,
        /// URL that refused the request
        url: String,
    },

    /// Malformed URL or a 400 answer
    #[error("request rejected: {message}")]
    BadRequest {
        /// Provider body or local reason
        message: String,
    },

    /// No answer within the configured request timeout
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    /// JSON body could not be decoded
    #[error("undecodable JSON body: {0}")]
    Parse(#[from] serde_json::Error),

    /// Provider answered 5xx
    #[error("provider failure ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },
}

impl ClientError {
    /// A 429 asking for a pause of `seconds`.
    #[must_use]
    pub fn rate_limited(seconds: u64) -> Self {
        Self::RateLimited { retry_after: Duration::from_secs(seconds) }
    }

    /// A 404/410 for `resource`.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create a blocked error.
    #[must_use]
    pub fn blocked(status: u16, url: impl Into<String>) -> Self {
        Self::Blocked { status, url: url.into() }
    }

    /// A rejected or malformed request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    /// A 5xx answer.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// Returns true for failures worth trying again later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout(_) | Self::Server { .. })
    }

    /// Returns true if the site actively refused the request.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Pause the provider asked for, if it throttled the request.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Errors raised by a single resolver.
///
/// These never abort a batch: the chain turns each one into a diagnostic tag
/// and, if no resolver succeeds, into a cached Error record.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// Transport failure or non-success provider response.
    #[error("{provider}: fetch failed: {source}")]
    Fetch {
        /// Provider that was contacted
        provider: String,
        /// Underlying client error
        #[source]
        source: ClientError,
    },

    /// Malformed or unexpected provider payload.
    #[error("{provider}: parse failed: {message}")]
    Parse {
        /// Provider that produced the payload
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// No DOI/arXiv/PMC identifier derivable and no fallback matched.
    #[error("no identifier derivable for {url}")]
    NoIdentifier {
        /// URL that could not be resolved
        url: String,
    },
}

impl ResolveError {
    /// Create a fetch error.
    #[must_use]
    pub fn fetch(provider: impl Into<String>, source: ClientError) -> Self {
        Self::Fetch { provider: provider.into(), source }
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse { provider: provider.into(), message: message.into() }
    }

    /// Create a no-identifier error.
    #[must_use]
    pub fn no_identifier(url: impl Into<String>) -> Self {
        Self::NoIdentifier { url: url.into() }
    }

    /// Diagnostic tag recorded for this failure.
    #[must_use]
    pub const fn tag(&self) -> Tag {
        match self {
            Self::Fetch { .. } => Tag::FetchError,
            Self::Parse { .. } => Tag::ParseError,
            Self::NoIdentifier { .. } => Tag::NoIdentifier,
        }
    }

    /// Returns true if the provider refused automated access.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Fetch { source, .. } if source.is_blocked())
    }
}

/// Errors from the persistent resolution cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// SQLite failure
    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure (cache or backup directory)
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored JSON column could not be (de)serialized
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Restore requested from a snapshot that does not exist
    #[error("Backup not found: {}", .0.display())]
    BackupNotFound(PathBuf),
}

/// Errors surfaced by the engine.
#[derive(thiserror::Error, Debug)]
pub enum CitationError {
    /// Error from the resolution cache
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Error building the HTTP session
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Resolved metadata contradicts the asserted authors.
    #[error(
        "Validation failed for {citation_id}: confidence {confidence:.2}, resolved authors: {}",
        resolved_authors.join("; ")
    )]
    ValidationFailed {
        /// Citation that failed
        citation_id: String,
        /// Computed confidence score
        confidence: f64,
        /// Authoritative author list
        resolved_authors: Vec<String>,
    },
}

impl CitationError {
    /// Convert to a user-facing message.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::ValidationFailed { citation_id, resolved_authors, .. } => {
                format!(
                    "Citation {citation_id} is not supported by its source. Authoritative authors: {}",
                    resolved_authors.join("; ")
                )
            }
            Self::Cache(CacheError::BackupNotFound(path)) => {
                format!("No backup at {}. Run `cache backups` to list snapshots.", path.display())
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for engine operations.
pub type CitationResult<T> = Result<T, CitationError>;
