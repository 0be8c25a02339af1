//! Subjects: the entities descriptors are grounded on.
//!
//! A [`Subject`] pairs a short, human-readable name (`Robot1`) with the full
//! IRI it has in the ontology (`http://example.org/onto#Robot1`). Stores
//! resolve names through a [`Namespace`], so two descriptors asking for the
//! same name always land on the same IRI.

use serde::{Deserialize, Serialize};

/// Classification of an ontology entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityRole {
    /// A named individual (`Robot1`, `Corridor1`).
    Individual,
    /// A class (`Robot`, `Corridor`).
    Class,
}

impl std::fmt::Display for EntityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRole::Individual => write!(f, "Individual"),
            EntityRole::Class => write!(f, "Class"),
        }
    }
}

/// The entity a descriptor is grounded on. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subject {
    name: String,
    iri: String,
}

impl Subject {
    /// Build a subject from an already-resolved name and IRI.
    pub fn new(name: impl Into<String>, iri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            iri: iri.into(),
        }
    }

    /// Short name, as used inside facts.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full IRI in the ontology.
    pub fn iri(&self) -> &str {
        &self.iri
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Maps short names to IRIs under one ontology IRI.
///
/// Names are appended after a `#` separator. Identifiers that already look
/// like absolute IRIs (contain `://`) are kept as they are, in both
/// directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    base: String,
}

impl Namespace {
    /// Create a namespace rooted at the given ontology IRI.
    ///
    /// A trailing `#` or `/` is stripped so resolution never doubles separators.
    pub fn new(ontology_iri: impl Into<String>) -> Self {
        let mut base: String = ontology_iri.into();
        while base.ends_with('#') || base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    /// The ontology IRI without trailing separator.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Full IRI for a name or IRI.
    pub fn iri(&self, identifier: &str) -> String {
        if is_absolute(identifier) {
            identifier.to_string()
        } else {
            format!("{}#{}", self.base, identifier)
        }
    }

    /// Short name for an IRI.
    ///
    /// IRIs under this namespace lose their `base#` prefix. Foreign IRIs are
    /// returned whole, so [`Namespace::iri`] maps them back to themselves.
    pub fn short_name(&self, iri: &str) -> String {
        iri.strip_prefix(&self.base)
            .and_then(|rest| rest.strip_prefix('#'))
            .filter(|name| !name.is_empty())
            .unwrap_or(iri)
            .to_string()
    }

    /// Resolve a name or IRI into a [`Subject`].
    pub fn resolve(&self, identifier: &str) -> Subject {
        let iri = self.iri(identifier);
        let name = self.short_name(&iri);
        Subject::new(name, iri)
    }
}

fn is_absolute(identifier: &str) -> bool {
    identifier.contains("://") || identifier.starts_with("urn:")
}
