use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::sensor::SensorStatus;

/// Command-line arguments for the sensor-proxy binary.
#[derive(Debug, Parser)]
#[command(
    name = "sensor-proxy",
    version,
    about = "Caching telemetry proxy for plant-floor sensor dashboards"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SENSOR_PROXY_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the telemetry proxy HTTP service.
    Serve(Box<ServeArgs>),
    /// Poll one sensor through a running proxy and log its readings.
    Poll(Box<PollArgs>),
    /// Repair a pasted connection config and show the endpoint it resolves to.
    #[command(name = "repair-config")]
    RepairConfig(RepairConfigArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
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
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the endpoint used when a request carries no usable config.
    #[arg(long = "upstream-default-endpoint", value_name = "URL")]
    pub upstream_default_endpoint: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-request-timeout-seconds", value_name = "SECONDS")]
    pub upstream_request_timeout_seconds: Option<u64>,

    /// Override the cache entry lifetime.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the expired-entry sweep period (0 disables the sweep).
    #[arg(long = "cache-sweep-interval-seconds", value_name = "SECONDS")]
    pub cache_sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct PollArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Sensor identifier, used for the default resource path.
    #[arg(value_name = "SENSOR_ID")]
    pub sensor_id: String,

    /// Resource path to poll; defaults to `<SENSOR_ID>/live/speed`
    /// (`sensor1/live/speed` for SPD-01).
    #[arg(long = "resource-path", value_name = "PATH")]
    pub resource_path: Option<String>,

    /// Connection config text sent with every request.
    #[arg(
        long = "connection-config",
        value_name = "TEXT",
        conflicts_with = "connection_config_file"
    )]
    pub connection_config: Option<String>,

    /// Read the connection config from a file.
    #[arg(
        long = "connection-config-file",
        value_name = "FILE",
        value_hint = ValueHint::FilePath
    )]
    pub connection_config_file: Option<PathBuf>,

    /// Sensor status; inactive sensors are never polled.
    #[arg(long, value_name = "STATUS", default_value_t = SensorStatus::Active)]
    pub status: SensorStatus,

    /// Override the polling interval.
    #[arg(long = "interval-ms", value_name = "MILLIS")]
    pub interval_ms: Option<u64>,

    /// Override the proxy base URL.
    #[arg(long = "proxy-url", value_name = "URL")]
    pub proxy_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RepairConfigArgs {
    /// File holding the pasted config; reads stdin when omitted or `-`.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,
}
