//! Configuration for the citation resolution engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::scoring::ConfidenceThresholds;

/// Default values and provider endpoints.
pub mod defaults {
    use std::time::Duration;

    /// DOI resolver used for content negotiation.
    pub const DOI_RESOLVER_URL: &str = "https://doi.org";

    /// Crossref REST API (public scholarly index used for indirect searches).
    pub const CROSSREF_API_URL: &str = "https://api.crossref.org";

    /// arXiv export API.
    pub const ARXIV_API_URL: &str = "https://export.arxiv.org/api";

    /// NCBI E-utilities (PubMed Central summaries).
    pub const NCBI_EUTILS_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

    /// Directory name under the per-user cache dir.
    pub const CACHE_DIR_NAME: &str = "citation-resolver";

    /// Cache TTL in days.
    pub const CACHE_TTL_DAYS: i64 = 30;

    /// Backups kept after pruning.
    pub const BACKUP_RETENTION: usize = 5;

    /// Rolling backup interval (24 hours).
    pub const BACKUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Minimum interval between two requests to the same provider.
    pub const POLITENESS_DELAY: Duration = Duration::from_secs(1);

    /// Request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Transient-failure retries per request.
    pub const MAX_RETRIES: u32 = 2;

    /// Lifetime of fetched pages in the in-run memo.
    pub const PAGE_CACHE_TTL: Duration = Duration::from_secs(600);

    /// Maximum pages held in the in-run memo.
    pub const PAGE_CACHE_MAX_SIZE: u64 = 256;

    /// Concurrent citations per batch.
    pub const WORKERS: usize = 4;

    /// Maximum idle connections per host.
    pub const MAX_KEEPALIVE: usize = 10;

    /// Keepalive expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the cache database and its backups.
    pub cache_dir: PathBuf,

    /// Age after which automated records are treated as absent.
    pub cache_ttl: chrono::Duration,

    /// Number of backups kept.
    pub backup_retention: usize,

    /// Interval of the rolling backup schedule.
    pub backup_interval: Duration,

    /// Minimum interval between requests to one provider host.
    pub politeness_delay: Duration,

    /// Request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Retries for transient failures.
    pub max_retries: u32,

    /// In-run page memo TTL.
    pub page_cache_ttl: Duration,

    /// In-run page memo capacity.
    pub page_cache_max_size: u64,

    /// Worker pool width for batches.
    pub workers: usize,

    /// Ignore cached automated records and resolve again.
    pub force_refresh: bool,

    /// Status thresholds for the confidence scorer.
    pub thresholds: ConfidenceThresholds,

    /// DOI resolver base URL (for testing with mock servers).
    pub doi_resolver_url: String,

    /// Crossref API base URL.
    pub crossref_api_url: String,

    /// arXiv API base URL.
    pub arxiv_api_url: String,

    /// NCBI E-utilities base URL.
    pub ncbi_eutils_url: String,

    /// Contact address advertised in the User-Agent.
    pub contact_email: Option<String>,

    /// Run `pdftotext` for first-page heuristics when available.
    pub use_pdftotext: bool,
}

impl Config {
    /// Create a configuration with production defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_ttl: chrono::Duration::days(defaults::CACHE_TTL_DAYS),
            backup_retention: defaults::BACKUP_RETENTION,
            backup_interval: defaults::BACKUP_INTERVAL,
            politeness_delay: defaults::POLITENESS_DELAY,
            request_timeout: defaults::REQUEST_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            max_retries: defaults::MAX_RETRIES,
            page_cache_ttl: defaults::PAGE_CACHE_TTL,
            page_cache_max_size: defaults::PAGE_CACHE_MAX_SIZE,
            workers: defaults::WORKERS,
            force_refresh: false,
            thresholds: ConfidenceThresholds::default(),
            doi_resolver_url: defaults::DOI_RESOLVER_URL.to_string(),
            crossref_api_url: defaults::CROSSREF_API_URL.to_string(),
            arxiv_api_url: defaults::ARXIV_API_URL.to_string(),
            ncbi_eutils_url: defaults::NCBI_EUTILS_URL.to_string(),
            contact_email: None,
            use_pdftotext: true,
        }
    }

    /// Create a test configuration with every provider pointed at a mock server.
    #[must_use]
    pub fn for_testing(base_url: &str, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            cache_ttl: chrono::Duration::days(defaults::CACHE_TTL_DAYS),
            backup_retention: 3,
            backup_interval: Duration::from_secs(24 * 60 * 60),
            politeness_delay: Duration::from_millis(0), // No delay in tests
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            max_retries: 0,
            page_cache_ttl: Duration::from_secs(60),
            page_cache_max_size: 64,
            workers: 2,
            force_refresh: false,
            thresholds: ConfidenceThresholds::default(),
            doi_resolver_url: base_url.to_string(),
            crossref_api_url: format!("{base_url}/crossref"),
            arxiv_api_url: format!("{base_url}/arxiv"),
            ncbi_eutils_url: format!("{base_url}/eutils"),
            contact_email: None,
            use_pdftotext: false,
        }
    }

    /// Create configuration from environment variables (after loading `.env`).
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::new();

        if let Ok(dir) = std::env::var("CITATION_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(days) = env_parse::<i64>("CITATION_CACHE_TTL_DAYS")? {
            config.cache_ttl = ttl_from_days(days)?;
        }
        if let Some(secs) = env_parse::<f64>("CITATION_POLITENESS_SECS")? {
            config.politeness_delay = politeness_from_secs(secs)?;
        }
        if let Some(workers) = env_parse::<usize>("CITATION_WORKERS")? {
            config.workers = workers.max(1);
        }
        if let Some(force) = env_parse::<bool>("CITATION_FORCE_REFRESH")? {
            config.force_refresh = force;
        }
        if let Some(validated) = env_parse::<f64>("CITATION_VALIDATED_THRESHOLD")? {
            config.thresholds.validated = validated;
        }
        if let Some(partial) = env_parse::<f64>("CITATION_PARTIAL_THRESHOLD")? {
            config.thresholds.partial = partial;
        }
        config.contact_email = std::env::var("CITATION_CONTACT_EMAIL").ok();

        Ok(config)
    }

    /// Path of the cache database.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join("resolutions.sqlite3")
    }

    /// Directory holding cache snapshots.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.cache_dir.join("backups")
    }

    /// User-Agent sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> String {
        match &self.contact_email {
            Some(email) => format!(
                "citation-resolver/{} (mailto:{email})",
                env!("CARGO_PKG_VERSION")
            ),
            None => format!("citation-resolver/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join(defaults::CACHE_DIR_NAME)
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(None),
    }
}

/// Cache TTL from a day count.
///
/// # Errors
///
/// Returns error for a negative count or one past the representable range.
pub fn ttl_from_days(days: i64) -> anyhow::Result<chrono::Duration> {
    anyhow::ensure!(days >= 0, "cache TTL must not be negative, got {days} days");
    chrono::Duration::try_days(days)
        .filter(|ttl| chrono::Utc::now().checked_sub_signed(*ttl).is_some())
        .ok_or_else(|| anyhow::anyhow!("cache TTL of {days} days is out of range"))
}

/// Politeness delay from seconds; negative values mean no delay.
///
/// # Errors
///
/// Returns error for a non-finite or overflowing value.
pub fn politeness_from_secs(secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs.max(0.0))
        .map_err(|e| anyhow::anyhow!("invalid politeness delay {secs}s: {e}"))
}
