use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from peervault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PvConfig {
    pub log: LogConfig,
    pub trust: TrustConfig,
    pub gate: GateConfig,
    pub share: ShareConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Trust store JSON document (default: ~/.local/share/peervault/trust_store.json)
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Seconds of inactivity after which the in-memory master key is dropped
    pub inactivity_timeout_secs: u64,
    /// Require a TOTP code after the master password
    pub totp_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Private staging directory for in-flight encrypted artifacts
    pub staging_dir: PathBuf,
    /// Suffix appended to encrypted artifact names
    pub encrypted_suffix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            store_path: data_dir().join("trust_store.json"),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 300,
            totp_enabled: false,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            staging_dir: data_dir().join("staging"),
            encrypted_suffix: ".age".into(),
        }
    }
}

impl PvConfig {
    /// Load configuration from a TOML file; defaults when the file is absent.
    pub fn load(path: &std::path::Path) -> crate::PvResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| crate::PvError::Config(format!("parsing {}: {e}", path.display())))
    }
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".local/share")
        })
        .join("peervault")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[log]
level = "debug"
format = "json"

[trust]
store_path = "/tmp/pv-test/trust_store.json"

[gate]
inactivity_timeout_secs = 60
totp_enabled = true

[share]
staging_dir = "/tmp/pv-test/staging"
encrypted_suffix = ".age"
"#;
        let config: PvConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.gate.inactivity_timeout_secs, 60);
        assert!(config.gate.totp_enabled);
        assert_eq!(
            config.trust.store_path,
            PathBuf::from("/tmp/pv-test/trust_store.json")
        );
        assert_eq!(config.share.encrypted_suffix, ".age");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: PvConfig = toml::from_str("").unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.gate.inactivity_timeout_secs, 300);
        assert!(!config.gate.totp_enabled);
        assert_eq!(config.share.encrypted_suffix, ".age");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = PvConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.log.level, "info");
    }
}
