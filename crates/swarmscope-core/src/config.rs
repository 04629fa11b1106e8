//! Configuration loading and validation for the Swarmscope service.
//!
//! Configuration is a flat key-to-value structure. It is read from a YAML
//! file (`swarmscope.yaml` by default), then overridden per key by
//! `SWARMSCOPE_<KEY>` environment variables. A missing file is not an error.
//!
//! Validation never aborts startup. Each malformed, out-of-range, or
//! unrecognized entry becomes one [`ConfigInvalid`] report and the default
//! for that key is kept. [`ServiceConfig::load`] logs every report once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::source::DEFAULT_SIMULATED_ENTITIES;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "swarmscope.yaml";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "SWARMSCOPE_CONFIG";

/// Prefix for per-key environment overrides.
pub const ENV_PREFIX: &str = "SWARMSCOPE_";

/// Default refresh interval in milliseconds.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 2000;

/// Upper bound on simulated robots and tasks.
pub const MAX_SIMULATED_ENTITIES: u32 = 10_000;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 5000;

const KEY_REFRESH_INTERVAL_MS: &str = "refresh_interval_ms";
const KEY_SIMULATED_ENTITIES: &str = "simulated_entities";
const KEY_SIMULATED_DRIFT: &str = "simulated_drift";
const KEY_SOURCE: &str = "source";
const KEY_REPLAY_PATH: &str = "replay_path";
const KEY_HOST: &str = "host";
const KEY_PORT: &str = "port";

/// Every key the service understands.
pub const KNOWN_KEYS: [&str; 7] = [
    KEY_REFRESH_INTERVAL_MS,
    KEY_SIMULATED_ENTITIES,
    KEY_SIMULATED_DRIFT,
    KEY_SOURCE,
    KEY_REPLAY_PATH,
    KEY_HOST,
    KEY_PORT,
];

/// Errors that prevent a configuration file from being read at all.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The document parsed but is not a flat key-to-value mapping.
    #[error("config must be a mapping of keys to scalar values")]
    NotAMapping,
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// A single configuration entry that was rejected.
///
/// The default for `key` is used instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid config value {key}={value:?}: {reason}")]
pub struct ConfigInvalid {
    /// The offending key.
    pub key: String,
    /// The raw value as supplied.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl ConfigInvalid {
    fn new(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_owned(),
            value: value.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Which data source backs the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Deterministic simulator.
    #[default]
    Simulated,
    /// Recorded frames replayed from a JSON file.
    Replay {
        /// Path to the recording.
        path: PathBuf,
    },
}

/// Fully resolved service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Milliseconds between the end of one refresh and the next.
    pub refresh_interval_ms: u64,
    /// Robots and tasks generated by the simulator.
    pub simulated_entities: u32,
    /// Per-tick positional drift applied by the simulator.
    pub simulated_drift: f64,
    /// Backing data source.
    pub source: SourceKind,
    /// Bind host for the HTTP server.
    pub host: String,
    /// Bind port for the HTTP server.
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            simulated_entities: DEFAULT_SIMULATED_ENTITIES,
            simulated_drift: 0.0,
            source: SourceKind::Simulated,
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServiceConfig {
    /// The refresh interval as a [`Duration`].
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Resolve a key-to-value map into a configuration.
    ///
    /// Never fails: every rejected entry is returned alongside the
    /// configuration, which holds the default for that key.
    pub fn from_values(values: &BTreeMap<String, String>) -> (Self, Vec<ConfigInvalid>) {
        let mut config = Self::default();
        let mut issues = Vec::new();

        for (key, value) in values {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                issues.push(ConfigInvalid::new(key, value, "unrecognized key, ignored"));
            }
        }

        if let Some(raw) = values.get(KEY_REFRESH_INTERVAL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(0) => issues.push(ConfigInvalid::new(
                    KEY_REFRESH_INTERVAL_MS,
                    raw,
                    "must be a positive number of milliseconds",
                )),
                Ok(ms) => config.refresh_interval_ms = ms,
                Err(e) => issues.push(ConfigInvalid::new(KEY_REFRESH_INTERVAL_MS, raw, e.to_string())),
            }
        }

        if let Some(raw) = values.get(KEY_SIMULATED_ENTITIES) {
            match raw.trim().parse::<u32>() {
                Ok(n) if n <= MAX_SIMULATED_ENTITIES => config.simulated_entities = n,
                Ok(_) => issues.push(ConfigInvalid::new(
                    KEY_SIMULATED_ENTITIES,
                    raw,
                    format!("must be at most {MAX_SIMULATED_ENTITIES}"),
                )),
                Err(e) => issues.push(ConfigInvalid::new(KEY_SIMULATED_ENTITIES, raw, e.to_string())),
            }
        }

        if let Some(raw) = values.get(KEY_SIMULATED_DRIFT) {
            match raw.trim().parse::<f64>() {
                Ok(drift) if drift.is_finite() => config.simulated_drift = drift,
                Ok(_) => issues.push(ConfigInvalid::new(KEY_SIMULATED_DRIFT, raw, "must be finite")),
                Err(e) => issues.push(ConfigInvalid::new(KEY_SIMULATED_DRIFT, raw, e.to_string())),
            }
        }

        let replay_path = values
            .get(KEY_REPLAY_PATH)
            .map(|p| p.trim())
            .filter(|p| !p.is_empty());

        if let Some(raw) = values.get(KEY_SOURCE) {
            match raw.trim().to_lowercase().as_str() {
                "simulated" => config.source = SourceKind::Simulated,
                "replay" => match replay_path {
                    Some(path) => {
                        config.source = SourceKind::Replay {
                            path: PathBuf::from(path),
                        };
                    }
                    None => issues.push(ConfigInvalid::new(
                        KEY_SOURCE,
                        raw,
                        "replay source requires replay_path",
                    )),
                },
                _ => issues.push(ConfigInvalid::new(
                    KEY_SOURCE,
                    raw,
                    "expected `simulated` or `replay`",
                )),
            }
        }

        if let Some(raw) = values.get(KEY_HOST) {
            let host = raw.trim();
            if host.is_empty() {
                issues.push(ConfigInvalid::new(KEY_HOST, raw, "must not be empty"));
            } else {
                host.clone_into(&mut config.host);
            }
        }

        if let Some(raw) = values.get(KEY_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(0) => issues.push(ConfigInvalid::new(KEY_PORT, raw, "must be in 1..=65535")),
                Ok(port) => config.port = port,
                Err(e) => issues.push(ConfigInvalid::new(KEY_PORT, raw, e.to_string())),
            }
        }

        (config, issues)
    }

    /// Load configuration from the default location plus the environment.
    ///
    /// The file path comes from `SWARMSCOPE_CONFIG` or falls back to
    /// [`DEFAULT_CONFIG_FILE`]. A missing file yields defaults; an
    /// unreadable file is logged and also yields defaults. Every rejected
    /// entry is logged once at `warn`.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);

        let mut values = if path.exists() {
            match read_values(&path) {
                Ok(values) => {
                    info!(path = %path.display(), keys = values.len(), "Config file loaded");
                    values
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Config file unusable, using defaults");
                    BTreeMap::new()
                }
            }
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            BTreeMap::new()
        };

        apply_env_overrides(&mut values, std::env::vars());

        let (config, issues) = Self::from_values(&values);
        for issue in &issues {
            warn!(
                key = %issue.key,
                value = %issue.value,
                reason = %issue.reason,
                "Invalid configuration entry, default substituted"
            );
        }
        config
    }
}

/// Read a YAML config file into a key-to-value map.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or is not a flat
/// YAML mapping.
pub fn read_values(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_values(&contents)
}

/// Parse YAML text into a key-to-value map.
///
/// Scalars (strings, numbers, booleans) are kept in their textual form so
/// they validate the same way environment overrides do. An empty document
/// is an empty map. Nested values are rejected.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] on malformed YAML, or
/// [`ConfigError::NotAMapping`] if the document is not a flat mapping.
pub fn parse_values(yaml: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let document: serde_yml::Value = serde_yml::from_str(yaml)?;
    let mapping = match document {
        serde_yml::Value::Null => return Ok(BTreeMap::new()),
        serde_yml::Value::Mapping(mapping) => mapping,
        _ => return Err(ConfigError::NotAMapping),
    };

    let mut values = BTreeMap::new();
    for (key, value) in mapping {
        let key = scalar_text(&key).ok_or(ConfigError::NotAMapping)?;
        let value = scalar_text(&value).ok_or(ConfigError::NotAMapping)?;
        values.insert(key, value);
    }
    Ok(values)
}

/// Overlay `SWARMSCOPE_<KEY>` variables for known keys onto `values`.
///
/// Variables that do not name a known key (such as `SWARMSCOPE_CONFIG`)
/// are ignored.
pub fn apply_env_overrides(
    values: &mut BTreeMap<String, String>,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    for (name, value) in vars {
        let Some(suffix) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key = suffix.to_lowercase();
        if KNOWN_KEYS.contains(&key.as_str()) {
            values.insert(key, value);
        }
    }
}

fn scalar_text(value: &serde_yml::Value) -> Option<String> {
    match value {
        serde_yml::Value::String(s) => Some(s.clone()),
        serde_yml::Value::Number(n) => Some(n.to_string()),
        serde_yml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn empty_map_yields_defaults() {
        let (config, issues) = ServiceConfig::from_values(&BTreeMap::new());
        assert!(issues.is_empty());
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.refresh_interval(), Duration::from_millis(2000));
        assert_eq!(config.simulated_entities, 5);
    }

    #[test]
    fn valid_values_are_applied() {
        let (config, issues) = ServiceConfig::from_values(&values(&[
            ("refresh_interval_ms", "250"),
            ("simulated_entities", "12"),
            ("simulated_drift", "0.5"),
            ("host", "127.0.0.1"),
            ("port", "8088"),
        ]));
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(config.refresh_interval_ms, 250);
        assert_eq!(config.simulated_entities, 12);
        assert_eq!(config.simulated_drift, 0.5);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8088);
    }

    #[test]
    fn zero_interval_falls_back_to_default() {
        let (config, issues) = ServiceConfig::from_values(&values(&[("refresh_interval_ms", "0")]));
        assert_eq!(config.refresh_interval_ms, DEFAULT_REFRESH_INTERVAL_MS);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues.first().unwrap().key, "refresh_interval_ms");
    }

    #[test]
    fn malformed_values_each_report_once() {
        let (config, issues) = ServiceConfig::from_values(&values(&[
            ("refresh_interval_ms", "fast"),
            ("simulated_entities", "-3"),
            ("simulated_drift", "NaN"),
            ("port", "70000"),
            ("host", "   "),
        ]));
        assert_eq!(issues.len(), 5);
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn too_many_entities_is_out_of_range() {
        let (config, issues) =
            ServiceConfig::from_values(&values(&[("simulated_entities", "10001")]));
        assert_eq!(config.simulated_entities, DEFAULT_SIMULATED_ENTITIES);
        assert!(issues.first().unwrap().reason.contains("at most"));
    }

    #[test]
    fn unknown_keys_are_reported() {
        let (_, issues) = ServiceConfig::from_values(&values(&[("refresh_rate", "5")]));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues.first().unwrap().key, "refresh_rate");
    }

    #[test]
    fn replay_source_needs_a_path() {
        let (config, issues) = ServiceConfig::from_values(&values(&[("source", "replay")]));
        assert_eq!(config.source, SourceKind::Simulated);
        assert_eq!(issues.len(), 1);

        let (config, issues) = ServiceConfig::from_values(&values(&[
            ("source", "Replay"),
            ("replay_path", "recordings/run1.json"),
        ]));
        assert!(issues.is_empty());
        assert_eq!(
            config.source,
            SourceKind::Replay {
                path: PathBuf::from("recordings/run1.json")
            }
        );
    }

    #[test]
    fn yaml_scalars_become_text() {
        let parsed = parse_values(
            "refresh_interval_ms: 500\nsimulated_drift: 1.5\nhost: localhost\nextra: true\n",
        )
        .unwrap();
        assert_eq!(parsed.get("refresh_interval_ms").unwrap(), "500");
        assert_eq!(parsed.get("simulated_drift").unwrap(), "1.5");
        assert_eq!(parsed.get("host").unwrap(), "localhost");
        assert_eq!(parsed.get("extra").unwrap(), "true");
    }

    #[test]
    fn empty_yaml_is_empty_map() {
        assert!(parse_values("").unwrap().is_empty());
    }

    #[test]
    fn nested_yaml_is_rejected() {
        let result = parse_values("sync:\n  refresh_interval_ms: 500\n");
        assert!(matches!(result, Err(ConfigError::NotAMapping)));

        let result = parse_values("- 1\n- 2\n");
        assert!(matches!(result, Err(ConfigError::NotAMapping)));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = parse_values("refresh_interval_ms: [1, 2");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn env_overrides_known_keys_only() {
        let mut map = values(&[("refresh_interval_ms", "500")]);
        apply_env_overrides(
            &mut map,
            vec![
                ("SWARMSCOPE_REFRESH_INTERVAL_MS".to_owned(), "100".to_owned()),
                ("SWARMSCOPE_CONFIG".to_owned(), "other.yaml".to_owned()),
                ("SWARMSCOPE_PORT".to_owned(), "9000".to_owned()),
                ("PATH".to_owned(), "/usr/bin".to_owned()),
            ],
        );
        assert_eq!(map.get("refresh_interval_ms").unwrap(), "100");
        assert_eq!(map.get("port").unwrap(), "9000");
        assert!(!map.contains_key("config"));
        assert_eq!(map.len(), 2);
    }
}
