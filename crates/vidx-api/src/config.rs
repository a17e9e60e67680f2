//! API and fetch loop configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_SEARCH_QUERY: &str = "cricket";
pub const DEFAULT_FETCH_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_COOLDOWN_MULTIPLIER: u32 = 5;

/// Extra time granted to an in-flight cycle on shutdown, on top of one interval.
pub const SHUTDOWN_GRACE_EXTRA: Duration = Duration::from_secs(5);

/// Parse an env var, warning and falling back to `default` when it is set
/// but unparsable.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid {}={:?}, using default {}", name, raw, default);
                default
            }
        },
        _ => default,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            "" => default,
            _ => {
                warn!("Invalid {}={:?}, using default {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Which `VideoIndex` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchBackend {
    #[default]
    Elasticsearch,
    Memory,
}

impl FromStr for SearchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "elasticsearch" | "elastic" | "es" => Ok(Self::Elasticsearch),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown search backend '{}'", other)),
        }
    }
}

impl fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchBackend::Elasticsearch => write!(f, "elasticsearch"),
            SearchBackend::Memory => write!(f, "memory"),
        }
    }
}

// =============================================================================
// API
// =============================================================================

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Page size used when a listing request omits `size`
    pub default_page_size: u32,
    /// Upper bound for `size`
    pub max_page_size: u32,
    pub metrics_enabled: bool,
    pub search_backend: SearchBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 64 * 1024,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            metrics_enabled: true,
            search_backend: SearchBackend::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_page_size = env_or("MAX_PAGE_SIZE", MAX_PAGE_SIZE).max(1);
        let default_page_size = env_or("DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE).clamp(1, max_page_size);

        Self {
            host: std::env::var("API_HOST")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.host),
            port: env_or("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_or("RATE_LIMIT_RPS", defaults.rate_limit_rps),
            max_body_size: env_or("MAX_BODY_SIZE", defaults.max_body_size),
            default_page_size,
            max_page_size,
            metrics_enabled: env_flag("METRICS_ENABLED", true),
            search_backend: env_or("SEARCH_BACKEND", SearchBackend::default()),
        }
    }
}

// =============================================================================
// Fetch loop
// =============================================================================

/// Background fetch loop configuration.
#[derive(Clone)]
pub struct FetchConfig {
    /// Search term sent upstream
    pub search_query: String,
    /// Time between cycles
    pub interval: Duration,
    /// Cooldown after the key pool came back empty, in intervals
    pub cooldown_multiplier: u32,
    /// Run the loop at all
    pub enabled: bool,
    /// Raw API key pool
    pub api_keys: Vec<String>,
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("search_query", &self.search_query)
            .field("interval", &self.interval)
            .field("cooldown_multiplier", &self.cooldown_multiplier)
            .field("enabled", &self.enabled)
            .field("api_keys", &format_args!("[{} keys]", self.api_keys.len()))
            .finish()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            search_query: DEFAULT_SEARCH_QUERY.to_string(),
            interval: Duration::from_secs(DEFAULT_FETCH_INTERVAL_SECS),
            cooldown_multiplier: DEFAULT_COOLDOWN_MULTIPLIER,
            enabled: true,
            api_keys: Vec::new(),
        }
    }
}

impl FetchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let interval_secs = env_or("FETCH_INTERVAL_SECONDS", DEFAULT_FETCH_INTERVAL_SECS).max(1);

        Self {
            search_query: std::env::var("SEARCH_QUERY")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SEARCH_QUERY.to_string()),
            interval: Duration::from_secs(interval_secs),
            cooldown_multiplier: env_or("FETCH_COOLDOWN_MULTIPLIER", DEFAULT_COOLDOWN_MULTIPLIER).max(1),
            enabled: env_flag("FETCH_ENABLED", true),
            api_keys: std::env::var("YOUTUBE_API_KEYS")
                .map(|s| {
                    s.split(',')
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Sleep after a cycle that found no usable API key.
    pub fn cooldown(&self) -> Duration {
        self.interval * self.cooldown_multiplier
    }

    /// How long shutdown waits for an in-flight cycle before aborting it.
    pub fn shutdown_grace(&self) -> Duration {
        self.interval + SHUTDOWN_GRACE_EXTRA
    }
}
