use clap::{Parser, ValueEnum};
use discount_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "DISCOUNT_GRPC_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "DISCOUNT_STORAGE_BACKEND";
pub const POSTGRES_DSN_ENV: &str = "DISCOUNT_POSTGRES_DSN";
pub const POSTGRES_MAX_CONNECTIONS_ENV: &str = "DISCOUNT_POSTGRES_MAX_CONNECTIONS";
pub const RUN_MIGRATIONS_ENV: &str = "DISCOUNT_RUN_MIGRATIONS";
pub const REQUEST_TIMEOUT_ENV: &str = "DISCOUNT_REQUEST_TIMEOUT_SECS";
pub const HEALTH_INTERVAL_ENV: &str = "DISCOUNT_HEALTH_INTERVAL_SECS";
pub const LOG_FORMAT_ENV: &str = "DISCOUNT_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "DISCOUNT_OTLP_ENDPOINT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:50051";
pub const DEFAULT_POSTGRES_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "discount-grpc-server")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = POSTGRES_DSN_ENV, required_if_eq("storage", "postgres"))]
    pub postgres_dsn: Option<String>,

    #[arg(
        long,
        env = POSTGRES_MAX_CONNECTIONS_ENV,
        default_value_t = DEFAULT_POSTGRES_MAX_CONNECTIONS
    )]
    pub postgres_max_connections: u32,

    /// Apply pending schema migrations before serving.
    #[arg(long, env = RUN_MIGRATIONS_ENV, default_value_t = false)]
    pub run_migrations: bool,

    #[arg(
        long,
        env = REQUEST_TIMEOUT_ENV,
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    pub request_timeout_secs: u64,

    #[arg(
        long,
        env = HEALTH_INTERVAL_ENV,
        default_value_t = DEFAULT_HEALTH_INTERVAL_SECS
    )]
    pub health_interval_secs: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,

    #[arg(long, env = OTLP_ENDPOINT_ENV)]
    pub otlp_endpoint: Option<String>,
}

impl CLI {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }
}
