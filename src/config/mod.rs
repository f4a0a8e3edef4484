//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use cron::Schedule;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::SyncConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "hotboard";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_RESYNC_CRON: &str = "0 0 * * * *";
const DEFAULT_WINDOW_DAYS: u32 = 7;
const DEFAULT_BATCH_LIMIT: u32 = 1000;
const DEFAULT_DETAIL_TTL_SECS: u64 = 3600;
const DEFAULT_TOP_N: u32 = 10;

/// Command-line arguments for the hotboard binary.
#[derive(Debug, Parser)]
#[command(name = "hotboard", version, about = "Hot-comments ranking service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "HOTBOARD_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service with the background resync worker.
    Serve(ServeArgs),
    /// Run one batch resync and exit.
    Resync(ResyncArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ResyncArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the cache store URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the resync cron expression.
    #[arg(long = "sync-cron", value_name = "EXPR")]
    pub sync_cron: Option<String>,

    /// Override the resync lookback window in days.
    #[arg(long = "sync-window-days", value_name = "DAYS")]
    pub sync_window_days: Option<u32>,

    /// Override the resync row ceiling.
    #[arg(long = "sync-batch-limit", value_name = "COUNT")]
    pub sync_batch_limit: Option<u32>,

    /// Override the detail snapshot TTL in seconds.
    #[arg(long = "sync-detail-ttl-seconds", value_name = "SECONDS")]
    pub sync_detail_ttl_seconds: Option<u64>,

    /// Override the served board size.
    #[arg(long = "sync-top-n", value_name = "COUNT")]
    pub sync_top_n: Option<u32>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub schedule: Schedule,
    pub window_days: u32,
    pub batch_limit: NonZeroU32,
    pub detail_ttl: Duration,
    pub top_n: NonZeroU32,
}

impl SyncSettings {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            window_days: self.window_days,
            batch_limit: i64::from(self.batch_limit.get()),
            detail_ttl: self.detail_ttl,
            top_n: self.top_n.get() as usize,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("HOTBOARD").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::Resync(args)) => raw.apply_overrides(&args.overrides),
        None => raw.apply_overrides(&Overrides::default()),
    }

    Settings::from_raw(raw)
}

/// Parse CLI arguments and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    redis: RawRedisSettings,
    sync: RawSyncSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSyncSettings {
    cron: Option<String>,
    window_days: Option<u32>,
    batch_limit: Option<u32>,
    detail_ttl_seconds: Option<u64>,
    top_n: Option<u32>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(count) = overrides.database_max_connections {
            self.database.max_connections = Some(count);
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(cron) = overrides.sync_cron.as_ref() {
            self.sync.cron = Some(cron.clone());
        }
        if let Some(days) = overrides.sync_window_days {
            self.sync.window_days = Some(days);
        }
        if let Some(limit) = overrides.sync_batch_limit {
            self.sync.batch_limit = Some(limit);
        }
        if let Some(seconds) = overrides.sync_detail_ttl_seconds {
            self.sync.detail_ttl_seconds = Some(seconds);
        }
        if let Some(n) = overrides.sync_top_n {
            self.sync.top_n = Some(n);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            redis,
            sync,
        } = raw;

        let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = server.port.unwrap_or(DEFAULT_PORT);
        let listen_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|err| LoadError::invalid("server.host", format!("failed to parse: {err}")))?;
        let graceful_shutdown = Duration::from_secs(
            server
                .graceful_shutdown_seconds
                .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        );

        let level = match logging.level {
            Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
                LoadError::invalid("logging.level", format!("failed to parse: {err}"))
            })?,
            None => LevelFilter::INFO,
        };
        let format = if logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let max_connections = NonZeroU32::new(
            database
                .max_connections
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        )
        .ok_or_else(|| LoadError::invalid("database.max_connections", "must be at least 1"))?;

        let redis_url = redis.url.unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        let cron = sync.cron.unwrap_or_else(|| DEFAULT_RESYNC_CRON.to_string());
        let schedule = Schedule::from_str(cron.as_str())
            .map_err(|err| LoadError::invalid("sync.cron", format!("failed to parse: {err}")))?;
        let batch_limit = NonZeroU32::new(sync.batch_limit.unwrap_or(DEFAULT_BATCH_LIMIT))
            .ok_or_else(|| LoadError::invalid("sync.batch_limit", "must be at least 1"))?;
        let top_n = NonZeroU32::new(sync.top_n.unwrap_or(DEFAULT_TOP_N))
            .ok_or_else(|| LoadError::invalid("sync.top_n", "must be at least 1"))?;

        Ok(Settings {
            server: ServerSettings {
                listen_addr,
                graceful_shutdown,
            },
            logging: LoggingSettings { level, format },
            database: DatabaseSettings {
                url: database.url,
                max_connections,
            },
            redis: RedisSettings { url: redis_url },
            sync: SyncSettings {
                schedule,
                window_days: sync.window_days.unwrap_or(DEFAULT_WINDOW_DAYS),
                batch_limit,
                detail_ttl: Duration::from_secs(
                    sync.detail_ttl_seconds.unwrap_or(DEFAULT_DETAIL_TTL_SECS),
                ),
                top_n,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_without_any_input() {
        let settings = Settings::from_raw(RawSettings::default()).expect("defaults");
        assert_eq!(settings.server.listen_addr.port(), DEFAULT_PORT);
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert_eq!(settings.sync.window_days, 7);
        assert_eq!(settings.sync.batch_limit.get(), 1000);
        assert_eq!(settings.sync.top_n.get(), 10);
        assert_eq!(settings.sync.detail_ttl, Duration::from_secs(3600));
        assert!(settings.database.url.is_none());
    }

    #[test]
    fn cli_override_wins_over_raw_value() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("info".to_string());

        let overrides = Overrides {
            log_level: Some("debug".to_string()),
            ..Overrides::default()
        };
        raw.apply_overrides(&overrides);

        let settings = Settings::from_raw(raw).expect("settings");
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn json_toggle_selects_format() {
        let mut raw = RawSettings::default();
        raw.logging.json = Some(true);
        let settings = Settings::from_raw(raw).expect("settings");
        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn invalid_cron_is_rejected() {
        let mut raw = RawSettings::default();
        raw.sync.cron = Some("whenever".to_string());
        let err = Settings::from_raw(raw).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { key: "sync.cron", .. }));
    }

    #[test]
    fn zero_batch_limit_is_rejected() {
        let mut raw = RawSettings::default();
        raw.sync.batch_limit = Some(0);
        let err = Settings::from_raw(raw).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "sync.batch_limit",
                ..
            }
        ));
    }

    #[test]
    fn sync_settings_convert_to_cache_config() {
        let settings = Settings::from_raw(RawSettings::default()).expect("defaults");
        let config = settings.sync.sync_config();
        assert_eq!(config.batch_limit, 1000);
        assert_eq!(config.top_n, 10);
    }
}
