use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use uuid::Uuid;

/// Command-line arguments for the eventhub binary.
#[derive(Debug, Parser)]
#[command(name = "eventhub", version, about = "Event registration and certificate server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "EVENTHUB_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP listeners and the completion scanner.
    Serve(Box<ServeArgs>),
    /// Run a single completion scan and exit.
    Scan(ScanArgs),
    /// Render one participant's certificate to a file without sending it.
    Preview(PreviewArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

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

    /// Override the completion scan cadence.
    #[arg(long = "scheduler-cadence-seconds", value_name = "SECONDS")]
    pub scheduler_cadence_seconds: Option<u64>,

    /// Enable or disable the completion scanner.
    #[arg(
        long = "scheduler-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub scheduler_enabled: Option<bool>,

    /// Override the sender address used for outgoing mail.
    #[arg(long = "mail-from", value_name = "ADDRESS")]
    pub mail_from: Option<String>,

    /// Override the frontend base URL used in registration links.
    #[arg(long = "frontend-url", value_name = "URL")]
    pub frontend_url: Option<String>,

    /// Override the registration rate limit window size.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,

    /// Override the registration rate limit request ceiling.
    #[arg(long = "rate-limit-max-requests", value_name = "COUNT")]
    pub rate_limit_max_requests: Option<u64>,

    /// Trust `X-Forwarded-For` when keying the registration rate limit.
    #[arg(
        long = "rate-limit-trust-forwarded-for",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub rate_limit_trust_forwarded_for: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Participant whose certificate should be rendered.
    #[arg(long = "participant", value_name = "UUID")]
    pub participant: Uuid,

    /// Path of the PDF file to write.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}
