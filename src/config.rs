use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::ResultExt as _;
use url::Url;

use crate::error::{ApplicationError, ConfigLoadSnafu};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Connection URL for the document store, carrying the namespace and
    /// database via the `ns` and `db` query parameters.
    #[serde(rename = "hypematch_store_url")]
    pub store_url: Url,

    #[serde(rename = "hypematch_log_dir", default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// How often the expiry sweep runs, in humantime notation (`15m`, `1h`).
    #[serde(
        rename = "hypematch_sweep_interval",
        default = "default_sweep_interval",
        deserialize_with = "duration"
    )]
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}
