use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const LISTEN_ADDR_ENV: &str = "FERRY_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "FERRY_STORAGE_BACKEND";
pub const SQLITE_PATH_ENV: &str = "FERRY_SQLITE_PATH";
pub const UPLOAD_DIR_ENV: &str = "FERRY_UPLOAD_DIR";
pub const ADMIN_KEY_ENV: &str = "FERRY_ADMIN_KEY";
pub const TTL_HOURS_ENV: &str = "FERRY_TTL_HOURS";
pub const SWEEP_INTERVAL_ENV: &str = "FERRY_SWEEP_INTERVAL_SECS";
pub const RATE_LIMIT_WINDOW_ENV: &str = "FERRY_RATE_LIMIT_WINDOW_SECS";
pub const RATE_LIMIT_MAX_ENV: &str = "FERRY_RATE_LIMIT_MAX_REQUESTS";
pub const MAX_UPLOAD_BYTES_ENV: &str = "FERRY_MAX_UPLOAD_BYTES";
pub const LOG_FORMAT_ENV: &str = "FERRY_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SQLITE_PATH: &str = "data/ferry.sqlite3";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_TTL_HOURS: &str = "24";
pub const DEFAULT_SWEEP_INTERVAL_SECS: &str = "7200";
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: &str = "60";
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: &str = "120";
// 2 GiB
pub const DEFAULT_MAX_UPLOAD_BYTES: &str = "2147483648";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "sqlite")]
    Sqlite,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "ferry", about = "Ephemeral file and paste sharing over HTTP")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Sqlite
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = SQLITE_PATH_ENV, default_value = DEFAULT_SQLITE_PATH)]
    pub sqlite_path: PathBuf,

    #[arg(long, env = UPLOAD_DIR_ENV, default_value = DEFAULT_UPLOAD_DIR)]
    pub upload_dir: PathBuf,

    /// Key required by `/admin-stats`. The endpoint is closed when unset.
    #[arg(long, env = ADMIN_KEY_ENV, hide_env_values = true)]
    pub admin_key: Option<String>,

    #[arg(long, env = TTL_HOURS_ENV, default_value = DEFAULT_TTL_HOURS)]
    pub ttl_hours: i64,

    #[arg(long, env = SWEEP_INTERVAL_ENV, default_value = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    #[arg(long, env = RATE_LIMIT_WINDOW_ENV, default_value = DEFAULT_RATE_LIMIT_WINDOW_SECS)]
    pub rate_limit_window_secs: u64,

    #[arg(long, env = RATE_LIMIT_MAX_ENV, default_value = DEFAULT_RATE_LIMIT_MAX_REQUESTS)]
    pub rate_limit_max_requests: usize,

    #[arg(long, env = MAX_UPLOAD_BYTES_ENV, default_value = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = CLI::try_parse_from(["ferry"]).unwrap();
        assert_eq!(cli.listen_addr, DEFAULT_LISTEN_ADDR.parse().unwrap());
        assert_eq!(cli.storage, StorageBackendArg::Sqlite);
        assert_eq!(cli.ttl_hours, 24);
        assert_eq!(cli.sweep_interval_secs, 7200);
        assert_eq!(cli.rate_limit_max_requests, 120);
        assert_eq!(cli.max_upload_bytes, 2 * 1024 * 1024 * 1024);
        assert!(cli.admin_key.is_none());
    }

    #[test]
    fn huge_ttl_is_a_config_error() {
        let cli = CLI::try_parse_from(["ferry", "--ttl-hours", &i64::MAX.to_string()]).unwrap();
        assert!(ferry_depot::DepotConfig::ttl_from_hours(cli.ttl_hours).is_err());
    }

    #[test]
    fn storage_backend_by_name() {
        let cli = CLI::try_parse_from(["ferry", "--storage", "in-memory", "--log-format", "json"])
            .unwrap();
        assert_eq!(cli.storage, StorageBackendArg::InMemory);
        assert_eq!(cli.log_format, LogFormatArg::Json);
    }
}
