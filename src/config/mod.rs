use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub funnel: FunnelConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            funnel: FunnelConfig::from_env()?,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Funnel-engine runtime settings.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    /// Fallback webhook when a funnel definition carries none.
    pub webhook_url: Option<String>,
    /// Fallback post-submission redirect.
    pub redirect_url: Option<String>,
    /// Cooperative wait before the redirect resolves, giving marketing
    /// listeners time to consume the submission broadcast.
    pub settle: Duration,
    /// Hosted backend connection; when absent the service runs on in-memory
    /// stores (demo/development mode).
    pub backend: Option<BackendConfig>,
}

impl FunnelConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_url = non_empty(env::var("FUNNEL_WEBHOOK_URL").ok());
        let redirect_url = non_empty(env::var("FUNNEL_REDIRECT_URL").ok());
        let settle_ms = env::var("FUNNEL_SETTLE_MS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidSettleDelay)?;

        let backend = match non_empty(env::var("BACKEND_URL").ok()) {
            Some(base_url) => {
                let api_key =
                    non_empty(env::var("BACKEND_API_KEY").ok()).ok_or(ConfigError::MissingApiKey)?;
                Some(BackendConfig { base_url, api_key })
            }
            None => None,
        };

        Ok(Self {
            webhook_url,
            redirect_url,
            settle: Duration::from_millis(settle_ms),
            backend,
        })
    }
}

/// Hosted backend connection settings.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSettleDelay,
    MissingApiKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSettleDelay => {
                write!(f, "FUNNEL_SETTLE_MS must be a whole number of milliseconds")
            }
            ConfigError::MissingApiKey => {
                write!(f, "BACKEND_API_KEY is required when BACKEND_URL is set")
            }
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
