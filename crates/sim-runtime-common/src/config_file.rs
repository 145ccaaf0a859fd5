//! Simulation file structures for the sim-runtime.
//!
//! A simulation file is the resolved resource graph handed over by the
//! compiler, plus the simulator settings to run it with:
//! - [`SimulationFile`]: Top-level file structure
//! - [`ResourceEntry`]: One resource instance and its configuration
//! - [`ResourceMetadata`]: Correlation data forwarded to every trace

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{SimError, SimulatorConfig};

/// Top-level simulation file structure.
///
/// # Example
///
/// ```toml
/// [simulator.trace]
/// verbose = true
///
/// [simulator.storage]
/// backend = "filesystem"
/// dir_prefix = "wing-sim-"
///
/// [[resources]]
/// id = "root/Default/uploads"
/// type = "bucket"
/// props = { initialObjects = { "a.txt" = "hello" } }
/// metadata = { tracing = { source = "main.w:3" } }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulationFile {
    /// Simulator settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Resource instances, in initialization order.
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

impl SimulationFile {
    /// Load a simulation file from disk.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let file = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_toml(&content)?
        };

        debug!(path = %path.display(), resources = file.resources.len(), "Simulation file loaded");
        Ok(file)
    }

    /// Parse a simulation file from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Parse a simulation file from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, ConfigFileError> {
        serde_json::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Check simulator settings and resource entries.
    pub fn validate(&self) -> Result<(), SimError> {
        self.simulator.validate()?;

        for (index, entry) in self.resources.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(SimError::invalid_config(format!(
                    "resources[{index}] has an empty id"
                )));
            }
        }

        Ok(())
    }
}

/// One resource instance in the resolved graph.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceEntry {
    /// Stable identifier within the graph.
    pub id: String,

    /// Resource type tag (e.g. `bucket`).
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Type-specific configuration, interpreted by the resource itself.
    #[serde(default)]
    pub props: serde_json::Value,

    /// Correlation data for traces.
    #[serde(default)]
    pub metadata: ResourceMetadata,
}

impl ResourceEntry {
    /// Create an entry with empty props and metadata.
    pub fn new(id: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            props: serde_json::Value::Null,
            metadata: ResourceMetadata::default(),
        }
    }

    /// Set the type-specific configuration.
    #[must_use]
    pub fn with_props(mut self, props: serde_json::Value) -> Self {
        self.props = props;
        self
    }

    /// Set the tracing tags forwarded with every activity of this resource.
    #[must_use]
    pub fn with_tracing<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata.tracing = Some(
            tags.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

/// Metadata attached to a resource by the compiler.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceMetadata {
    /// Tracing tags from the originating program construct.
    #[serde(default)]
    pub tracing: Option<BTreeMap<String, String>>,
}

/// Simulation file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read the simulation file.
    #[error("Failed to read simulation file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the simulation file.
    #[error("Failed to parse simulation file: {message}")]
    Parse { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageBackendKind;

    #[test]
    fn test_default_simulation_file() {
        let file = SimulationFile::default();

        assert!(file.resources.is_empty());
        assert!(!file.simulator.trace.verbose);
        assert!(file.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [simulator.trace]
            verbose = true
            capacity = 50

            [simulator.storage]
            backend = "memory"

            [[resources]]
            id = "root/uploads"
            type = "bucket"
            props = { initialObjects = { "a.txt" = "hello" } }
            metadata = { tracing = { source = "main.w:3" } }

            [[resources]]
            id = "root/empty"
            type = "bucket"
        "#;

        let file = SimulationFile::from_toml(toml).unwrap();

        assert!(file.simulator.trace.verbose);
        assert_eq!(file.simulator.trace.capacity, 50);
        assert_eq!(file.simulator.storage.backend, StorageBackendKind::Memory);
        assert_eq!(file.resources.len(), 2);

        let first = &file.resources[0];
        assert_eq!(first.id, "root/uploads");
        assert_eq!(first.type_tag, "bucket");
        assert_eq!(first.props["initialObjects"]["a.txt"], "hello");
        let tags = first.metadata.tracing.as_ref().unwrap();
        assert_eq!(tags.get("source").map(String::as_str), Some("main.w:3"));

        let second = &file.resources[1];
        assert!(second.props.is_null());
        assert!(second.metadata.tracing.is_none());
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "resources": [
                {"id": "b", "type": "bucket", "props": {"initialObjects": {"k": "v"}}}
            ]
        }"#;

        let file = SimulationFile::from_json(json).unwrap();
        assert_eq!(file.resources[0].props["initialObjects"]["k"], "v");
        assert_eq!(file.simulator.storage.backend, StorageBackendKind::Filesystem);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = SimulationFile::from_toml("this is not valid toml [");
        assert!(matches!(result, Err(ConfigFileError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = SimulationFile::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigFileError::Io { .. })));
    }

    #[test]
    fn test_validate_empty_id() {
        let file = SimulationFile {
            resources: vec![ResourceEntry::new("  ", "bucket")],
            ..Default::default()
        };

        let err = file.validate().unwrap_err();
        assert!(err.to_string().contains("resources[0]"));
    }

    #[test]
    fn test_entry_builders() {
        let entry = ResourceEntry::new("b", "bucket")
            .with_props(serde_json::json!({"initialObjects": {}}))
            .with_tracing([("source", "app.w:1")]);

        assert!(entry.props["initialObjects"].is_object());
        assert_eq!(entry.metadata.tracing.unwrap()["source"], "app.w:1");
    }
}
