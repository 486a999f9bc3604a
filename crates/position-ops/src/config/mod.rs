use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::directory::{BatchGrouper, ChunkFailurePolicy, PaginatedReader};
use crate::workflows::vacancy::DEFAULT_EXCLUDED_UNITS;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Line layout for log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One short line per event without targets.
    #[default]
    Compact,
    /// Full lines including the emitting module and span fields.
    Full,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Sizing and policy knobs for the vacancy pipeline, plus the directory source.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub page_size: NonZeroUsize,
    pub chunk_size: NonZeroUsize,
    pub chunk_failure_policy: ChunkFailurePolicy,
    pub excluded_business_units: Vec<String>,
    pub snapshot_path: Option<PathBuf>,
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let page_size = size_var("APP_PAGE_SIZE", PaginatedReader::DEFAULT_PAGE_SIZE)?;
        let chunk_size = size_var("APP_BATCH_CHUNK_SIZE", BatchGrouper::DEFAULT_CHUNK_SIZE)?;

        let chunk_failure_policy = match env::var("APP_CHUNK_FAILURE_POLICY") {
            Ok(raw) => ChunkFailurePolicy::parse(&raw)
                .ok_or(ConfigError::InvalidChunkPolicy(raw))?,
            Err(_) => ChunkFailurePolicy::default(),
        };

        let excluded_business_units = match env::var("APP_EXCLUDED_BUSINESS_UNITS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => DEFAULT_EXCLUDED_UNITS.iter().map(|code| code.to_string()).collect(),
        };

        let snapshot_path = env::var("APP_DIRECTORY_SNAPSHOT")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            page_size,
            chunk_size,
            chunk_failure_policy,
            excluded_business_units,
            snapshot_path,
        })
    }

    pub fn reader(&self) -> PaginatedReader {
        PaginatedReader::new(self.page_size)
    }

    pub fn grouper(&self) -> BatchGrouper {
        BatchGrouper::new(self.chunk_size, self.chunk_failure_policy)
    }

    /// Snapshot path from the caller, falling back to `APP_DIRECTORY_SNAPSHOT`.
    pub fn snapshot_or(&self, explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        explicit
            .or_else(|| self.snapshot_path.clone())
            .ok_or(ConfigError::MissingSnapshot)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: PaginatedReader::DEFAULT_PAGE_SIZE,
            chunk_size: BatchGrouper::DEFAULT_CHUNK_SIZE,
            chunk_failure_policy: ChunkFailurePolicy::default(),
            excluded_business_units: DEFAULT_EXCLUDED_UNITS
                .iter()
                .map(|code| code.to_string())
                .collect(),
            snapshot_path: None,
        }
    }
}

fn size_var(variable: &'static str, default: NonZeroUsize) -> Result<NonZeroUsize, ConfigError> {
    match env::var(variable) {
        Ok(value) => value
            .trim()
            .parse::<NonZeroUsize>()
            .map_err(|_| ConfigError::InvalidSize { variable, value }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSize { variable: &'static str, value: String },
    InvalidChunkPolicy(String),
    InvalidLogFormat(String),
    MissingSnapshot,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSize { variable, value } => {
                write!(f, "{variable} must be a positive integer, got '{value}'")
            }
            ConfigError::InvalidChunkPolicy(value) => write!(
                f,
                "APP_CHUNK_FAILURE_POLICY must be 'fail-fast' or 'skip-chunk', got '{value}'"
            ),
            ConfigError::InvalidLogFormat(value) => write!(
                f,
                "APP_LOG_FORMAT must be 'compact' or 'full', got '{value}'"
            ),
            ConfigError::MissingSnapshot => write!(
                f,
                "no directory snapshot configured; pass --snapshot or set APP_DIRECTORY_SNAPSHOT"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
