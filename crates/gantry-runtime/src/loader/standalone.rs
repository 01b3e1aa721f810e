//! Standalone component loader
//!
//! Reads every `*.yaml`/`*.yml` file directly under a directory
//! (non-recursive), splits each file on the literal `\n---` document
//! separator, keeps documents whose `kind` is `Component`, and deserializes
//! each one. Errors in one document never fail the batch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gantry_common::{Error, Result};
use gantry_resources::Component;
use tracing::warn;

use super::ComponentLoader;

const YAML_SEPARATOR: &str = "\n---";
const COMPONENT_KIND: &str = "Component";

/// Loads component definitions from a directory of YAML manifests
pub struct StandaloneLoader {
    components_path: PathBuf,
}

impl StandaloneLoader {
    /// Create a loader reading from the given directory
    pub fn new(components_path: impl Into<PathBuf>) -> Self {
        Self {
            components_path: components_path.into(),
        }
    }

    fn is_yaml(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml")
        )
    }

    fn load_file(&self, path: &Path) -> Vec<Component> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read component file");
                return Vec::new();
            }
        };
        decode_components(&contents, &path.display().to_string())
    }
}

/// Split a manifest on the document separator and decode every component
/// document, skipping documents of other kinds and logging malformed ones
fn decode_components(contents: &str, source: &str) -> Vec<Component> {
    let mut components = Vec::new();
    for doc in contents.split(YAML_SEPARATOR) {
        if doc.trim().is_empty() {
            continue;
        }
        let value: serde_yaml::Value = match serde_yaml::from_str(doc) {
            Ok(v) => v,
            Err(e) => {
                warn!(source, error = %e, "skipping unparseable yaml document");
                continue;
            }
        };
        let kind = value.get("kind").and_then(|k| k.as_str()).unwrap_or_default();
        if kind != COMPONENT_KIND {
            continue;
        }
        match serde_yaml::from_value::<Component>(value) {
            Ok(component) => components.push(component),
            Err(e) => {
                let err = Error::decode(COMPONENT_KIND, e.to_string());
                warn!(source, error = %err, "skipping malformed component document");
            }
        }
    }
    components
}

#[async_trait]
impl ComponentLoader for StandaloneLoader {
    async fn load(&self) -> Result<Vec<Component>> {
        let entries = std::fs::read_dir(&self.components_path)
            .map_err(|e| Error::io(self.components_path.display().to_string(), e))?;

        let mut components = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(self.components_path.display().to_string(), e))?;
            let path = entry.path();
            if path.is_dir() || !Self::is_yaml(&path) {
                continue;
            }
            components.extend(self.load_file(&path));
        }
        Ok(components)
    }
}
