//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeSet, fmt, net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "timetable";
const ENV_PREFIX: &str = "TIMETABLE";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6379/0";
const DEFAULT_STORE_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_CATALOG_TTL_SECS: u64 = 60 * 60 * 24 * 21;
const DEFAULT_SCHEDULE_TTL_SECS: u64 = 60 * 60 * 24 * 3;
const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
const DEFAULT_LOCKOUT_WINDOW_SECS: u64 = 60 * 60 * 2;
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 10;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub admin: AdminSettings,
    pub sources: Vec<SourceSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend `{other}` (expected redis|memory)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub url: String,
    /// Bound on connecting, the liveness probe, and every command.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub catalog_ttl: Duration,
    pub schedule_ttl: Duration,
}

#[derive(Clone)]
pub struct AdminSettings {
    pub otp_secret: String,
    pub lockout_threshold: NonZeroU32,
    pub lockout_window: Duration,
    pub trust_forwarded_for: bool,
}

impl fmt::Debug for AdminSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSettings")
            .field("otp_secret", &"<redacted>")
            .field("lockout_threshold", &self.lockout_threshold)
            .field("lockout_window", &self.lockout_window)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub denomination: String,
    pub name: String,
    pub base_url: Url,
    pub timeout: Duration,
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Otp) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    cache: RawCacheSettings,
    admin: RawAdminSettings,
    sources: Vec<RawSourceSettings>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
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
        if let Some(backend) = overrides.store_backend.as_ref() {
            self.store.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.store_url.as_ref() {
            self.store.url = Some(url.clone());
        }
        if let Some(timeout) = overrides.store_timeout_ms {
            self.store.timeout_ms = Some(timeout);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(ttl) = overrides.cache_catalog_ttl_seconds {
            self.cache.catalog_ttl_seconds = Some(ttl);
        }
        if let Some(ttl) = overrides.cache_schedule_ttl_seconds {
            self.cache.schedule_ttl_seconds = Some(ttl);
        }
        if let Some(threshold) = overrides.admin_lockout_threshold {
            self.admin.lockout_threshold = Some(threshold);
        }
        if let Some(window) = overrides.admin_lockout_window_seconds {
            self.admin.lockout_window_seconds = Some(window);
        }
        if let Some(trust) = overrides.admin_trust_forwarded_for {
            self.admin.trust_forwarded_for = Some(trust);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            store,
            cache,
            admin,
            sources,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            store: build_store_settings(store)?,
            cache: build_cache_settings(cache)?,
            admin: build_admin_settings(admin)?,
            sources: build_source_settings(sources)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
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

    Ok(LoggingSettings { level, format })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let backend = match store.backend {
        Some(value) => StoreBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("store.backend", reason))?,
        None => StoreBackend::Redis,
    };

    let url = non_blank(store.url).unwrap_or_else(|| DEFAULT_STORE_URL.to_string());
    if backend == StoreBackend::Redis {
        Url::parse(&url).map_err(|err| LoadError::invalid("store.url", err.to_string()))?;
    }

    let timeout_ms = store.timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "store.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(StoreSettings {
        backend,
        url,
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let catalog_ttl = positive_seconds(
        cache.catalog_ttl_seconds.unwrap_or(DEFAULT_CATALOG_TTL_SECS),
        "cache.catalog_ttl_seconds",
    )?;
    let schedule_ttl = positive_seconds(
        cache
            .schedule_ttl_seconds
            .unwrap_or(DEFAULT_SCHEDULE_TTL_SECS),
        "cache.schedule_ttl_seconds",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        catalog_ttl,
        schedule_ttl,
    })
}

fn build_admin_settings(admin: RawAdminSettings) -> Result<AdminSettings, LoadError> {
    let otp_secret = non_blank(admin.otp_secret)
        .ok_or_else(|| LoadError::invalid("admin.otp_secret", "a base-32 secret is required"))?;

    let threshold = admin.lockout_threshold.unwrap_or(DEFAULT_LOCKOUT_THRESHOLD);
    let lockout_threshold = NonZeroU32::new(threshold).ok_or_else(|| {
        LoadError::invalid("admin.lockout_threshold", "must be greater than zero")
    })?;

    let lockout_window = positive_seconds(
        admin
            .lockout_window_seconds
            .unwrap_or(DEFAULT_LOCKOUT_WINDOW_SECS),
        "admin.lockout_window_seconds",
    )?;

    Ok(AdminSettings {
        otp_secret,
        lockout_threshold,
        lockout_window,
        trust_forwarded_for: admin.trust_forwarded_for.unwrap_or(true),
    })
}

fn build_source_settings(sources: Vec<RawSourceSettings>) -> Result<Vec<SourceSettings>, LoadError> {
    let mut seen = BTreeSet::new();
    let mut resolved = Vec::with_capacity(sources.len());

    for source in sources {
        let denomination = non_blank(source.denomination)
            .map(|value| value.to_lowercase())
            .ok_or_else(|| {
                LoadError::invalid("sources.denomination", "every source needs a denomination")
            })?;
        if !seen.insert(denomination.clone()) {
            return Err(LoadError::invalid(
                "sources.denomination",
                format!("`{denomination}` is configured more than once"),
            ));
        }

        let name = non_blank(source.name).unwrap_or_else(|| denomination.to_uppercase());

        let raw_url = non_blank(source.base_url).ok_or_else(|| {
            LoadError::invalid(
                "sources.base_url",
                format!("source `{denomination}` needs a base_url"),
            )
        })?;
        let base_url = Url::parse(&raw_url).map_err(|err| {
            LoadError::invalid("sources.base_url", format!("`{raw_url}`: {err}"))
        })?;

        let timeout = positive_seconds(
            source
                .timeout_seconds
                .unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECS),
            "sources.timeout_seconds",
        )?;

        resolved.push(SourceSettings {
            denomination,
            name,
            base_url,
            timeout,
        });
    }

    Ok(resolved)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<String>,
    url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    catalog_ttl_seconds: Option<u64>,
    schedule_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    otp_secret: Option<String>,
    lockout_threshold: Option<u32>,
    lockout_window_seconds: Option<u64>,
    trust_forwarded_for: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSourceSettings {
    denomination: Option<String>,
    name: Option<String>,
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
