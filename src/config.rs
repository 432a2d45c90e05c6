//! Runtime configuration
//!
//! Every setting can come from a command-line flag or an environment
//! variable. `.env` is loaded by the binary before parsing.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Access code used when `CODE` is not set
pub const DEFAULT_ACCESS_CODE: &str = "MM";

/// New Relic log ingestion endpoint
pub const DEFAULT_LOG_ENDPOINT: &str = "https://log-api.newrelic.com/log/v1";

/// Service name attached to every log entry
pub const SERVICE_NAME: &str = "KiteApp";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Shared access code required by the /api endpoints
    #[arg(long, env = "CODE", default_value = DEFAULT_ACCESS_CODE)]
    pub code: String,

    /// New Relic API key; logs stay local when unset
    #[arg(long, env = "NEW_RELIC_API_KEY")]
    pub new_relic_api_key: Option<String>,

    /// Deployment environment name reported with each log entry
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(short, long, env = "PORT", default_value_t = 443)]
    pub port: u16,

    /// Kite app credentials (api_key / api_secret)
    #[arg(long, env = "KITE_CREDENTIALS_PATH", default_value = "login_credentials.json")]
    pub credentials_path: PathBuf,

    /// Where the current Kite session is persisted
    #[arg(long, env = "KITE_SESSION_PATH", default_value = "session.json")]
    pub session_path: PathBuf,

    /// Directory for the rolling local log files
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Remote log collector endpoint
    #[arg(long, env = "NEW_RELIC_LOG_ENDPOINT", default_value = DEFAULT_LOG_ENDPOINT)]
    pub log_endpoint: String,

    /// Seconds between order status polls (1 second to 1 day)
    #[arg(
        long,
        env = "ORDER_POLL_SECS",
        default_value_t = 20,
        value_parser = clap::value_parser!(u64).range(1..=86_400)
    )]
    pub order_poll_secs: u64,

    /// Minute past the hour at which the health check runs
    #[arg(
        long,
        env = "HEALTH_CHECK_MINUTE",
        default_value_t = 15,
        value_parser = clap::value_parser!(u32).range(0..60)
    )]
    pub health_check_minute: u32,

    /// Number of health checks to run before the job retires itself
    #[arg(long, env = "HEALTH_CHECK_LIMIT", default_value_t = 15)]
    pub health_check_limit: u32,
}

impl Config {
    /// Socket address for the HTTP listener
    pub fn listen_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn order_poll_interval(&self) -> Duration {
        Duration::from_secs(self.order_poll_secs)
    }

    /// API key with blank values treated as absent
    pub fn log_api_key(&self) -> Option<String> {
        self.new_relic_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}
