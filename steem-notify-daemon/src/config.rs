use anyhow::{Context, Result};
use serde::Deserialize;
use steem_notify_connector::config::ConnectorConfig;
use steem_notify_logger::LogConfig;

/// The prefix of environment variables overriding the configuration file, e.g.
/// `STEEM_NOTIFY__CONNECTOR__STEEM__RPC_URL`.
pub const ENV_PREFIX: &str = "STEEM_NOTIFY";

/// The top-level configuration for the notification daemon.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub daemon: DaemonSpecificConfig,
}

/// Contains settings that are unique to the daemon binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSpecificConfig {
    /// Directory of the `sled` database holding the cursor and the feeds.
    pub db_path: String,
    pub log: LogConfig,
}

impl Default for DaemonSpecificConfig {
    fn default() -> Self {
        Self {
            db_path: "./steem_notify.db".to_string(),
            log: LogConfig::default(),
        }
    }
}

/// Loads the daemon configuration.
///
/// The TOML file at `path`, when given, is layered under environment variables prefixed
/// with [`ENV_PREFIX`]. Anything left unset keeps its default.
pub fn load_config(path: Option<&str>) -> Result<DaemonConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

    let settings: DaemonConfig = builder
        .build()
        .context(format!(
            "Failed to build configuration from '{}'",
            path.unwrap_or("<environment>")
        ))?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    Ok(settings)
}
