use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::billing::pipeline::PipelineConfig;

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

/// Which SRI integration documents are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// SOAP web services at the SRI.
    Soap,
    /// In-process stand-in that authorizes every well-formed document.
    Offline,
}

impl GatewayMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "soap" | "sri" => Ok(Self::Soap),
            "offline" | "local" => Ok(Self::Offline),
            other => Err(ConfigError::InvalidGateway(other.to_string())),
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub sri: SriConfig,
}

fn number_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var: name }),
        Err(_) => Ok(default),
    }
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

        // development talks to the offline gateway unless told otherwise
        let default_gateway = match environment {
            AppEnvironment::Production => "soap",
            AppEnvironment::Development | AppEnvironment::Test => "offline",
        };
        let gateway = GatewayMode::parse(
            &env::var("SRI_GATEWAY").unwrap_or_else(|_| default_gateway.to_string()),
        )?;
        let attempts = number_var("SRI_AUTHORIZATION_ATTEMPTS", 3)?;
        if attempts == 0 || attempts > u64::from(u32::MAX) {
            return Err(ConfigError::InvalidNumber {
                var: "SRI_AUTHORIZATION_ATTEMPTS",
            });
        }
        let retry_delay = Duration::from_millis(number_var("SRI_RETRY_DELAY_MS", 1000)?);
        let timeout = Duration::from_secs(number_var("SRI_TIMEOUT_SECS", 30)?);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            sri: SriConfig {
                gateway,
                authorization_attempts: attempts as u32,
                retry_delay,
                timeout,
            },
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// SRI integration settings.
#[derive(Debug, Clone)]
pub struct SriConfig {
    pub gateway: GatewayMode,
    /// Authorization calls per document, first one included.
    pub authorization_attempts: u32,
    pub retry_delay: Duration,
    /// HTTP timeout for each web-service call.
    pub timeout: Duration,
}

impl SriConfig {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            attempts: self.authorization_attempts,
            retry_delay: self.retry_delay,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidGateway(String),
    InvalidNumber { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidGateway(value) => {
                write!(f, "SRI_GATEWAY must be 'soap' or 'offline', got '{value}'")
            }
            ConfigError::InvalidNumber { var } => write!(f, "{var} must be a positive integer"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidGateway(_)
            | ConfigError::InvalidNumber { .. } => None,
        }
    }
}
