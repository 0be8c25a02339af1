//! Store configuration, persisted as TOML.
//!
//! A [`StoreConfig`] names a store, its ontology IRI, where it lives and
//! how it reasons, and opens the matching adapter:
//!
//! ```toml
//! name = "owloopTest"
//! iri = "http://www.example.org/owloopTest"
//! backend = "sparql"
//! location = "/var/lib/ontoloop/owloop"
//! reasoning = "hierarchy"
//! functional = ["isIn"]
//! disjoint = [["Robot", "Location"]]
//!
//! [descriptor]
//! missing_subject = "strict"
//! trace_sync = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::DescriptorConfig;
use crate::error::{ConfigError, OntoResult};
use crate::reason::Reasoning;
use crate::store::{FactStore, MemFactStore, SparqlFactStore};

/// Which adapter backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// [`MemFactStore`]; `location` is a redb snapshot file.
    #[default]
    Memory,
    /// [`SparqlFactStore`]; `location` is an oxigraph directory.
    Sparql,
}

/// Configuration of one fact store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Reference name of the store.
    pub name: String,
    /// Ontology IRI names are resolved under.
    pub iri: String,
    #[serde(default)]
    pub backend: Backend,
    /// On-disk location. `None` keeps everything in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    #[serde(default)]
    pub reasoning: Reasoning,
    /// Properties declared functional when the store is opened.
    #[serde(default)]
    pub functional: Vec<String>,
    /// Class pairs declared disjoint when the store is opened.
    #[serde(default)]
    pub disjoint: Vec<[String; 2]>,
    /// Defaults for descriptors built over this store.
    #[serde(default)]
    pub descriptor: DescriptorConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("default", "http://www.example.org/ontology")
    }
}

impl StoreConfig {
    /// In-memory, non-reasoning store config.
    pub fn new(name: impl Into<String>, iri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            iri: iri.into(),
            backend: Backend::Memory,
            location: None,
            reasoning: Reasoning::None,
            functional: Vec::new(),
            disjoint: Vec::new(),
            descriptor: DescriptorConfig::default(),
        }
    }

    /// Check that the ontology IRI is absolute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let absolute = self
            .iri
            .split_once("://")
            .is_some_and(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
            || self.iri.starts_with("urn:");
        if absolute && !self.iri.contains(char::is_whitespace) {
            Ok(())
        } else {
            Err(ConfigError::InvalidIri {
                iri: self.iri.clone(),
            })
        }
    }

    /// Open the configured backend behind the store trait.
    pub fn open_store(&self) -> OntoResult<Arc<dyn FactStore>> {
        Ok(match self.backend {
            Backend::Memory => Arc::new(self.open_memory()?),
            Backend::Sparql => Arc::new(self.open_sparql()?),
        })
    }

    /// Open a memory store, loading the snapshot at `location` if one exists.
    pub fn open_memory(&self) -> OntoResult<MemFactStore> {
        self.validate()?;
        let store = match &self.location {
            Some(path) if path.exists() => MemFactStore::load(path)?,
            _ => MemFactStore::new(self.name.clone(), self.iri.clone()),
        }
        .with_reasoning(self.reasoning);
        for property in &self.functional {
            store.declare_functional(property)?;
        }
        for [a, b] in &self.disjoint {
            store.declare_disjoint(a, b)?;
        }
        tracing::info!(
            store = %self.name,
            backend = "memory",
            reasoning = ?self.reasoning,
            "opened fact store"
        );
        Ok(store)
    }

    /// Open an oxigraph store, on disk when `location` is set.
    pub fn open_sparql(&self) -> OntoResult<SparqlFactStore> {
        self.validate()?;
        let store = match &self.location {
            Some(path) => SparqlFactStore::open(self.name.clone(), self.iri.clone(), path)?,
            None => SparqlFactStore::in_memory(self.name.clone(), self.iri.clone())?,
        }
        .with_reasoning(self.reasoning);
        for property in &self.functional {
            store.declare_functional(property)?;
        }
        for [a, b] in &self.disjoint {
            store.declare_disjoint(a, b)?;
        }
        tracing::info!(
            store = %self.name,
            backend = "sparql",
            reasoning = ?self.reasoning,
            "opened fact store"
        );
        Ok(store)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MissingSubject;
    use crate::error::OntoError;
    use tempfile::TempDir;

    #[test]
    fn toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf/store.toml");
        let mut config = StoreConfig::new("owloopTest", "http://www.example.org/owloopTest");
        config.backend = Backend::Sparql;
        config.reasoning = Reasoning::Hierarchy;
        config.functional.push("isIn".into());
        config.disjoint.push(["Robot".into(), "Location".into()]);
        config.descriptor.missing_subject = MissingSubject::Strict;

        config.save(&path).unwrap();
        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: StoreConfig =
            toml::from_str("name = \"t\"\niri = \"http://example.org/t\"\n").unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.reasoning, Reasoning::None);
        assert!(config.location.is_none());
        assert_eq!(config.descriptor, DescriptorConfig::default());
    }

    #[test]
    fn relative_iri_rejected() {
        let config = StoreConfig::new("t", "owloopTest");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIri { .. })
        ));
        assert!(matches!(
            config.open_store(),
            Err(OntoError::Config(ConfigError::InvalidIri { .. }))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = StoreConfig::load(Path::new("/nonexistent/ontoloop.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn open_applies_schema() {
        let mut config = StoreConfig::new("t", "http://example.org/t");
        config.functional.push("isIn".into());
        let store = config.open_memory().unwrap();
        assert!(store.schema().unwrap().is_functional("isIn"));

        config.backend = Backend::Sparql;
        let store = config.open_sparql().unwrap();
        assert!(store.schema().unwrap().is_functional("isIn"));
    }

    #[test]
    fn memory_store_reloads_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::new("t", "http://example.org/t");
        config.location = Some(dir.path().join("t.redb"));

        let store = config.open_memory().unwrap();
        let robot = store.resolve_name("Robot1");
        store
            .assert_fact(&robot, &crate::fact::Fact::of_type("Robot"))
            .unwrap();
        store.save(config.location.as_ref().unwrap()).unwrap();

        let reopened = config.open_store().unwrap();
        assert!(reopened.contains_subject(&robot).unwrap());
    }
}
