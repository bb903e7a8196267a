// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gate Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - Namespaces no gate may define units into
// - Whether new loaders may be created on this host
// - Static capability grants keyed by code source location and signers
// - Event bus sizing

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use super::capability::Capability;

pub const API_VERSION: &str = "codegate/v1";
pub const KIND: &str = "GateConfig";
pub const CONFIG_PATH_ENV: &str = "CODEGATE_CONFIG_PATH";
pub const ALLOW_CREATE_ENV: &str = "CODEGATE_ALLOW_LOADER_CREATION";

/// Top-level gate configuration manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// API version (must be "codegate/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GateConfig")
    pub kind: String,

    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: GateConfigSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfigSpec {
    /// Unit name prefixes no gate may define into (e.g. "core.")
    #[serde(default = "default_reserved_namespaces")]
    pub reserved_namespaces: Vec<String>,

    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Static capability grants
    #[serde(default)]
    pub grants: Vec<GrantConfig>,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    /// Whether new loader gates may be created
    #[serde(default = "default_allow_create")]
    pub allow_create: bool,
}

/// One static grant: code from `location` signed by every fingerprint in
/// `signers` receives `capabilities`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantConfig {
    /// Exact URL, or a prefix ending in `*`
    pub location: String,

    /// Required signer fingerprints (hex SHA-256); empty means any signers
    #[serde(default)]
    pub signers: Vec<String>,

    /// Capabilities as `action:target` strings
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity for the event bus
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for GateConfigSpec {
    fn default() -> Self {
        Self {
            reserved_namespaces: default_reserved_namespaces(),
            authorization: AuthorizationConfig::default(),
            grants: vec![],
            events: EventsConfig::default(),
        }
    }
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            allow_create: default_allow_create(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ConfigMetadata {
                name: "codegate".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: GateConfigSpec::default(),
        }
    }
}

impl GateConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml).context("Failed to parse configuration YAML")?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CODEGATE_CONFIG_PATH environment variable
    /// 2. ./codegate-config.yaml (working directory)
    /// 3. ~/.codegate/config.yaml (user home)
    /// 4. /etc/codegate/config.yaml (system, Unix) or C:\ProgramData\CodeGate\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./codegate-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".codegate").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/codegate/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\CodeGate\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path: fail if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup(ALLOW_CREATE_ENV) {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: {}=true", ALLOW_CREATE_ENV);
                    self.spec.authorization.allow_create = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: {}=false", ALLOW_CREATE_ENV);
                    self.spec.authorization.allow_create = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                        ALLOW_CREATE_ENV,
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        for prefix in &self.spec.reserved_namespaces {
            if prefix.is_empty() {
                anyhow::bail!("Reserved namespace prefix cannot be empty");
            }
        }

        for grant in &self.spec.grants {
            let location = grant.location.strip_suffix('*').unwrap_or(&grant.location);
            if Url::parse(location).is_err() {
                anyhow::bail!("Grant location is not a valid URL: '{}'", grant.location);
            }

            for fingerprint in &grant.signers {
                if fingerprint.len() != 64 || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
                    anyhow::bail!(
                        "Grant signer for '{}' is not a SHA-256 fingerprint: '{}'",
                        grant.location,
                        fingerprint
                    );
                }
            }

            for capability in &grant.capabilities {
                capability.parse::<Capability>().map_err(|e| {
                    anyhow::anyhow!("Grant for '{}': {}", grant.location, e)
                })?;
            }
        }

        if self.spec.events.capacity == 0 {
            anyhow::bail!("spec.events.capacity must be greater than zero");
        }

        Ok(())
    }
}

fn default_reserved_namespaces() -> Vec<String> {
    vec!["core.".to_string()]
}

fn default_allow_create() -> bool {
    true
}

fn default_event_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.kind, KIND);
        assert_eq!(config.spec.reserved_namespaces, vec!["core.".to_string()]);
        assert!(config.spec.authorization.allow_create);
        assert!(config.spec.grants.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: codegate/v1
kind: GateConfig
metadata:
  name: edge-loader
spec:
  grants:
    - location: "https://example.test/a.jar"
      capabilities: ["read:/tmp"]
"#;
        let config = GateConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.metadata.name, "edge-loader");
        assert_eq!(config.spec.reserved_namespaces, vec!["core.".to_string()]);
        assert_eq!(config.spec.events.capacity, 1000);
        assert_eq!(config.spec.grants.len(), 1);
        assert!(config.spec.grants[0].signers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codegate-config.yaml");

        let mut config = GateConfig::default();
        config.spec.grants.push(GrantConfig {
            location: "file:///opt/modules/*".to_string(),
            signers: vec!["ab".repeat(32)],
            capabilities: vec!["read:/tmp/*".to_string()],
        });
        config.to_yaml_file(&path).unwrap();

        let parsed = GateConfig::from_yaml_file(&path).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validation() {
        let mut config = GateConfig::default();

        config.api_version = "wrong/v1".to_string();
        assert!(config.validate().is_err());
        config.api_version = API_VERSION.to_string();

        config.kind = "WrongKind".to_string();
        assert!(config.validate().is_err());
        config.kind = KIND.to_string();

        config.spec.grants.push(GrantConfig {
            location: "not a url".to_string(),
            signers: vec![],
            capabilities: vec![],
        });
        assert!(config.validate().is_err());

        config.spec.grants[0].location = "https://example.test/a.jar".to_string();
        config.spec.grants[0].capabilities = vec!["no-separator".to_string()];
        assert!(config.validate().is_err());

        config.spec.grants[0].capabilities = vec!["read:/tmp".to_string()];
        config.spec.grants[0].signers = vec!["short".to_string()];
        assert!(config.validate().is_err());

        config.spec.grants[0].signers.clear();
        config.spec.events.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GateConfig::default();

        config.apply_overrides_from(|key| (key == ALLOW_CREATE_ENV).then(|| "off".to_string()));
        assert!(!config.spec.authorization.allow_create);

        // Unrecognised values are ignored
        config.apply_overrides_from(|_| Some("maybe".to_string()));
        assert!(!config.spec.authorization.allow_create);

        config.apply_overrides_from(|_| Some("YES".to_string()));
        assert!(config.spec.authorization.allow_create);
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(GateConfig::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "apiVersion: [unterminated").unwrap();

        let err = GateConfig::from_yaml_file(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
        assert!(err.to_string().contains("broken.yaml"));

        let err = GateConfig::from_yaml_str("kind: [").unwrap_err();
        assert!(format!("{:#}", err).starts_with("Failed to parse configuration YAML"));
    }
}
