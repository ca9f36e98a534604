use std::time::Duration;
use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::fw::forwarder::ForwarderConfig;
use crate::fw::shortcut_opt::ShortcutOpt;
use crate::tables::cs::DEFAULT_CS_CAPACITY;
use crate::tables::dead_nonce_list::{DEFAULT_DNL_CAPACITY, DEFAULT_DNL_LIFETIME};

/// Errors surfaced at configuration load time
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub logging: LoggingConfig,
    pub forwarder: ForwarderSection,
    pub tables: TablesConfig,
    pub shortcut_opt: Option<ShortcutOptConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub pid_file: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { pid_file: "/var/run/ndnd.pid".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None }
    }
}

/// The `forwarder` section
///
/// Only `default_hop_limit` is recognized; any other key is a configuration
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForwarderSection {
    /// Hop limit attached to Interests that carry none; 0 means do not attach
    pub default_hop_limit: u8,
}

impl Default for ForwarderSection {
    fn default() -> Self {
        Self { default_hop_limit: 0 }
    }
}

/// Bounds and policies of the in-memory tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub cs_max_packets: usize,
    /// "drop-all", "admit-local" or "admit-all"
    pub cs_unsolicited_policy: String,
    pub dead_nonce_list_capacity: usize,
    pub dead_nonce_list_lifetime_ms: u64,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            cs_max_packets: DEFAULT_CS_CAPACITY,
            cs_unsolicited_policy: "drop-all".to_string(),
            dead_nonce_list_capacity: DEFAULT_DNL_CAPACITY,
            dead_nonce_list_lifetime_ms: DEFAULT_DNL_LIFETIME.as_millis() as u64,
        }
    }
}

/// The optional shortcut-opt plug-in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutOptConfig {
    pub trigger_prefix: String,
    pub shortcut_name: String,
}

impl Default for ShortcutOptConfig {
    fn default() -> Self {
        Self {
            trigger_prefix: ShortcutOpt::DEFAULT_TRIGGER_PREFIX.to_string(),
            shortcut_name: ShortcutOpt::DEFAULT_SHORTCUT_NAME.to_string(),
        }
    }
}

impl Config {
    /// Load from a toml file; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// The forwarder-side view of this configuration
    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            default_hop_limit: self.forwarder.default_hop_limit,
            cs_capacity: self.tables.cs_max_packets,
            dnl_capacity: self.tables.dead_nonce_list_capacity,
            dnl_lifetime: Duration::from_millis(self.tables.dead_nonce_list_lifetime_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.forwarder.default_hop_limit, 0);
        assert_eq!(config.tables.cs_unsolicited_policy, "drop-all");
        assert!(config.shortcut_opt.is_none());
    }

    #[test]
    fn test_parse_forwarder_section() {
        let config: Config = toml::from_str(
            r#"
            [forwarder]
            default_hop_limit = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.forwarder.default_hop_limit, 16);
    }

    #[test]
    fn test_unknown_forwarder_key_is_an_error() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [forwarder]
            default_hop_limit = 1
            bogus_option = true
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_hop_limit_out_of_range_is_an_error() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [forwarder]
            default_hop_limit = 300
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/ndnd.conf").unwrap();
        assert_eq!(config.tables.cs_max_packets, DEFAULT_CS_CAPACITY);
    }

    #[test]
    fn test_shortcut_opt_section() {
        let config: Config = toml::from_str(
            r#"
            [shortcut_opt]
            "#,
        )
        .unwrap();
        let section = config.shortcut_opt.unwrap();
        assert_eq!(section.trigger_prefix, "/interCACHE");
        assert_eq!(section.shortcut_name, "/interCACHE/shortcutOPT");
    }
}
