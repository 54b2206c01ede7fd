//! Configuration for the `ixfrd` binary: logging and per-zone IXFR settings.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use ixfrd_engine::config::IxfrConfig;

//----------- LogLevel -----------------------------------------------------

/// A severity level for logging, matching the host project's `cli` crate
/// convention of a small hand-written enum rather than `tracing`'s own.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub const fn as_tracing_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

//----------- LogTarget -----------------------------------------------------

/// Where log output is written.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Stderr,
    Stdout,
    File(Utf8PathBuf),
}

//----------- LoggingConfig -------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub target: LogTarget,
}

//----------- ZoneConfig -----------------------------------------------------

/// The IXFR-relevant configuration of a single zone.
///
/// This mirrors the slice of a zone's policy that the engine actually reads:
/// its apex name, the path of its zone file (IXFR files are named relative
/// to it, per §4H's glue helpers), and its [`IxfrConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    pub zone_file: Utf8PathBuf,
    #[serde(default)]
    pub ixfr: IxfrConfig,
}

//----------- Config ----------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub zones: Vec<ZoneConfig>,
}

impl Config {
    /// Load a configuration from a TOML file.
    pub fn load(path: &camino::Utf8Path) -> Result<Self, crate::error::ExitError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::error::ExitError::Config(format!("{path}: {e}")))?;
        toml::from_str(&text).map_err(|e| crate::error::ExitError::Config(format!("{path}: {e}")))
    }

    /// Find a configured zone by its apex name.
    pub fn find_zone(&self, name: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|zone| zone.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_round_trips_through_from_str() {
        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warning", LogLevel::Warning),
            ("error", LogLevel::Error),
        ] {
            assert_eq!(text.parse::<LogLevel>().unwrap(), level);
        }
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!("deafening".parse::<LogLevel>().is_err());
    }

    #[test]
    fn config_parses_a_minimal_toml_document() {
        let toml = r#"
            [logging]
            level = "debug"
            target = "stdout"

            [[zones]]
            name = "example.com"
            zone_file = "/var/db/zones/example.com.zone"

            [zones.ixfr]
            store_ixfr = true
            ixfr_number = 10
            ixfr_size = 1048576
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.zones.len(), 1);
        assert_eq!(config.find_zone("example.com").unwrap().ixfr.ixfr_number, 10);
        assert!(config.find_zone("example.org").is_none());
    }
}
