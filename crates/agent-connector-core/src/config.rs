//! Connector configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "AGENT_CONNECTOR_";

/// Where the native connector library lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LibraryLocation {
    /// Bare library name resolved through the platform search path.
    SearchPath(String),
    /// Bare library name resolved in the directory of the running executable.
    NextToExecutable(String),
    /// Explicit file path.
    Path(PathBuf),
}

impl Default for LibraryLocation {
    fn default() -> Self {
        Self::NextToExecutable("agent_connector".to_string())
    }
}

impl LibraryLocation {
    /// Parse an override value: anything with a path separator is a path,
    /// otherwise a search-path name.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.contains('/') || value.contains('\\') {
            Self::Path(PathBuf::from(value))
        } else {
            Self::SearchPath(value.to_string())
        }
    }

    /// Name used in diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::SearchPath(name) | Self::NextToExecutable(name) => name.clone(),
            Self::Path(path) => path.display().to_string(),
        }
    }
}

/// Identity tuple passed to the agent library on initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentIdentity {
    pub agent_name: String,
    pub admin_address: String,
    pub build_version: String,
    pub group_id: String,
    /// What the agent does if the admin rejects its instance id.
    pub instance_id_policy: String,
}

impl Default for AgentIdentity {
    fn default() -> Self {
        Self {
            agent_name: "mysuperAgent".to_string(),
            admin_address: "localhost:8090".to_string(),
            build_version: "1.0.0".to_string(),
            group_id: "group".to_string(),
            instance_id_policy: "fail".to_string(),
        }
    }
}

/// Full connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Native library to load.
    pub library: LibraryLocation,

    /// Identity handed to `initialize_agent`.
    #[serde(flatten)]
    pub identity: AgentIdentity,

    /// Routing key for outbound messages.
    pub route: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            library: LibraryLocation::default(),
            identity: AgentIdentity::default(),
            route: "10".to_string(),
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConnectorConfig {
    /// Parse from a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Defaults with `AGENT_CONNECTOR_*` environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from `lookup`, keyed by full variable name
    /// (e.g. `AGENT_CONNECTOR_ROUTE`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(library) = get("LIBRARY") {
            self.library = LibraryLocation::parse(&library);
        }
        if let Some(v) = get("AGENT_NAME") {
            self.identity.agent_name = v;
        }
        if let Some(v) = get("ADMIN_ADDRESS") {
            self.identity.admin_address = v;
        }
        if let Some(v) = get("BUILD_VERSION") {
            self.identity.build_version = v;
        }
        if let Some(v) = get("GROUP_ID") {
            self.identity.group_id = v;
        }
        if let Some(v) = get("INSTANCE_ID_POLICY") {
            self.identity.instance_id_policy = v;
        }
        if let Some(v) = get("ROUTE") {
            self.route = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectorConfig::default();
        assert_eq!(config.route, "10");
        assert_eq!(config.identity.admin_address, "localhost:8090");
        assert_eq!(
            config.library,
            LibraryLocation::NextToExecutable("agent_connector".into())
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ConnectorConfig::from_json_str(
            r#"{
                "agent_name": "dotnet-agent",
                "library": { "kind": "path", "value": "/opt/drill/libagent_connector.so" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.identity.agent_name, "dotnet-agent");
        assert_eq!(config.identity.build_version, "1.0.0");
        assert_eq!(
            config.library,
            LibraryLocation::Path("/opt/drill/libagent_connector.so".into())
        );
    }

    #[test]
    fn test_serialization_is_flat() {
        let json = serde_json::to_value(ConnectorConfig::default()).unwrap();
        assert_eq!(json["agent_name"], "mysuperAgent");
        assert_eq!(json["library"]["kind"], "next_to_executable");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("AGENT_CONNECTOR_LIBRARY", "custom_connector"),
            ("AGENT_CONNECTOR_ROUTE", "42"),
            ("AGENT_CONNECTOR_GROUP_ID", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ConnectorConfig::default();
        config.apply_overrides(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(
            config.library,
            LibraryLocation::SearchPath("custom_connector".into())
        );
        assert_eq!(config.route, "42");
        assert_eq!(config.identity.group_id, "");
        assert_eq!(config.identity.agent_name, "mysuperAgent");
    }

    #[test]
    fn test_missing_file() {
        let err = ConnectorConfig::from_file("/nonexistent/agent-connector.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
