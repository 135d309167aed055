use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the timetable binary.
#[derive(Debug, Parser)]
#[command(
    name = "timetable",
    version,
    about = "Cached university timetable service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TIMETABLE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Print the current one-time code for the configured admin secret.
    Otp,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
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

    /// Select the store backend (redis|memory).
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub store_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "store-url", value_name = "URL")]
    pub store_url: Option<String>,

    /// Override the per-operation store timeout.
    #[arg(long = "store-timeout-ms", value_name = "MILLIS")]
    pub store_timeout_ms: Option<u64>,

    /// Enable or disable response caching.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the TTL of long-lived catalog entries.
    #[arg(long = "cache-catalog-ttl-seconds", value_name = "SECONDS")]
    pub cache_catalog_ttl_seconds: Option<u64>,

    /// Override the TTL of volatile schedule entries.
    #[arg(long = "cache-schedule-ttl-seconds", value_name = "SECONDS")]
    pub cache_schedule_ttl_seconds: Option<u64>,

    /// Override the failed attempts tolerated before a purge lockout.
    #[arg(long = "admin-lockout-threshold", value_name = "COUNT")]
    pub admin_lockout_threshold: Option<u32>,

    /// Override the purge lockout window.
    #[arg(long = "admin-lockout-window-seconds", value_name = "SECONDS")]
    pub admin_lockout_window_seconds: Option<u64>,

    /// Derive the client identity from `X-Forwarded-For`.
    #[arg(
        long = "admin-trust-forwarded-for",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub admin_trust_forwarded_for: Option<bool>,
}
