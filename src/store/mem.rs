//! In-memory fact store backed by DashMap.
//!
//! Facts are grouped per subject IRI in a sharded hashmap. Nothing reaches
//! disk unless [`MemFactStore::save`] writes a redb snapshot, which
//! [`MemFactStore::load`] reads back.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use dashmap::DashMap;

use crate::error::StoreError;
use crate::fact::{Fact, FactKind, FactSet};
use crate::reason::{ClassHierarchy, Reasoner, Reasoning, Schema, candidate_facts};
use crate::subject::{Namespace, Subject};
use crate::sync::ChangeSet;

use super::durable::SnapshotFile;
use super::{FactStore, StoreResult, of_kind};

const META_NAME: &str = "name";
const META_IRI: &str = "iri";
const META_SCHEMA: &str = "schema";
const META_REASONING: &str = "reasoning";

/// Concurrent in-memory fact store.
pub struct MemFactStore {
    name: String,
    namespace: Namespace,
    reasoning: Reasoning,
    schema: RwLock<Schema>,
    facts: DashMap<String, FactSet>,
    /// Serializes `apply` so the hierarchy snapshot it checks against is current.
    write_lock: Mutex<()>,
}

impl MemFactStore {
    /// Create an empty store without reasoning.
    pub fn new(name: impl Into<String>, ontology_iri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Namespace::new(ontology_iri),
            reasoning: Reasoning::None,
            schema: RwLock::new(Schema::new()),
            facts: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Select the inferences added to query results.
    pub fn with_reasoning(mut self, reasoning: Reasoning) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Replace the schema wholesale.
    pub fn with_schema(self, schema: Schema) -> Self {
        Self {
            schema: RwLock::new(schema),
            ..self
        }
    }

    pub fn reasoning(&self) -> Reasoning {
        self.reasoning
    }

    /// Declare a property functional. Existing facts are not re-checked.
    pub fn declare_functional(&self, property: &str) -> StoreResult<()> {
        self.schema_mut(|s| {
            s.declare_functional(property);
        })
    }

    /// Declare two classes disjoint. Existing facts are not re-checked.
    pub fn declare_disjoint(&self, a: &str, b: &str) -> StoreResult<()> {
        self.schema_mut(|s| {
            s.declare_disjoint(a, b);
        })
    }

    /// A copy of the current schema.
    pub fn schema(&self) -> StoreResult<Schema> {
        self.schema
            .read()
            .map(|s| s.clone())
            .map_err(|_| self.poisoned("schema"))
    }

    fn schema_mut(&self, f: impl FnOnce(&mut Schema)) -> StoreResult<()> {
        let mut schema = self.schema.write().map_err(|_| self.poisoned("schema"))?;
        f(&mut schema);
        Ok(())
    }

    fn poisoned(&self, what: &str) -> StoreError {
        StoreError::Unavailable {
            store: self.name.clone(),
            message: format!("{what} lock poisoned"),
        }
    }

    /// Facts asserted about `subject`, without inference.
    pub fn asserted(&self, subject: &Subject) -> FactSet {
        self.facts
            .get(subject.iri())
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Number of subjects with at least one asserted fact.
    pub fn subject_count(&self) -> usize {
        self.facts.len()
    }

    /// Total number of asserted facts.
    pub fn fact_count(&self) -> usize {
        self.facts.iter().map(|entry| entry.value().len()).sum()
    }

    /// Subclass graph over every asserted `SubClassOf` fact, optionally
    /// leaving out one subject's axioms.
    fn hierarchy_excluding(&self, skip_iri: Option<&str>) -> ClassHierarchy {
        let mut hierarchy = ClassHierarchy::new();
        for entry in self.facts.iter() {
            if Some(entry.key().as_str()) == skip_iri {
                continue;
            }
            let sub = self.namespace.short_name(entry.key());
            add_subclass_edges(&mut hierarchy, &sub, entry.value());
        }
        hierarchy
    }

    /// Write every subject's facts plus the schema to a redb snapshot,
    /// replacing whatever the file held.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let file = SnapshotFile::open(path)?;
        let mut entries = Vec::with_capacity(self.facts.len());
        for entry in self.facts.iter() {
            entries.push((entry.key().clone(), encode(entry.value())?));
        }
        let schema = self.schema()?;
        let meta = [
            (META_NAME, encode(&self.name)?),
            (META_IRI, encode(&self.namespace.base().to_string())?),
            (META_SCHEMA, encode(&schema)?),
            (META_REASONING, encode(&self.reasoning)?),
        ];
        file.write(&entries, &meta)?;
        tracing::info!(
            store = %self.name,
            path = %path.display(),
            subjects = entries.len(),
            "saved fact snapshot"
        );
        Ok(())
    }

    /// Rebuild a store from a snapshot written by [`MemFactStore::save`].
    pub fn load(path: &Path) -> StoreResult<Self> {
        let file = SnapshotFile::open(path)?;
        let name: String = decode_meta(&file, META_NAME)?;
        let iri: String = decode_meta(&file, META_IRI)?;
        let schema: Schema = decode_meta(&file, META_SCHEMA)?;
        let reasoning: Reasoning = decode_meta(&file, META_REASONING)?;

        let store = Self::new(name, iri)
            .with_reasoning(reasoning)
            .with_schema(schema);
        for (subject, bytes) in file.read_facts()? {
            let facts: FactSet = decode(&bytes)?;
            store.facts.insert(subject, facts);
        }
        tracing::info!(
            store = %store.name,
            path = %path.display(),
            subjects = store.facts.len(),
            "loaded fact snapshot"
        );
        Ok(store)
    }
}

fn add_subclass_edges(hierarchy: &mut ClassHierarchy, sub: &str, facts: &FactSet) {
    for fact in facts {
        if let Fact::SubClassOf { class } = fact {
            hierarchy.add_edge(sub, class.as_str());
        }
    }
}

fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

fn decode_meta<T: serde::de::DeserializeOwned>(file: &SnapshotFile, key: &str) -> StoreResult<T> {
    let bytes = file
        .read_meta(key)?
        .ok_or_else(|| StoreError::Serialization {
            message: format!("snapshot has no \"{key}\" entry"),
        })?;
    decode(&bytes)
}

impl FactStore for MemFactStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn ontology_iri(&self) -> &str {
        self.namespace.base()
    }

    fn resolve_name(&self, identifier: &str) -> Subject {
        self.namespace.resolve(identifier)
    }

    fn contains_subject(&self, subject: &Subject) -> StoreResult<bool> {
        Ok(self.facts.contains_key(subject.iri()))
    }

    fn query(&self, subject: &Subject, kind: FactKind) -> StoreResult<FactSet> {
        let asserted = self
            .facts
            .get(subject.iri())
            .map(|entry| of_kind(entry.value(), kind))
            .unwrap_or_default();

        let hierarchical = matches!(kind, FactKind::Type | FactKind::SubClassOf);
        if self.reasoning == Reasoning::None || !hierarchical {
            return Ok(asserted);
        }
        let schema = self.schema.read().map_err(|_| self.poisoned("schema"))?;
        let reasoner = Reasoner::new(self.hierarchy_excluding(None), &schema, self.reasoning);
        Ok(reasoner.expand(subject.name(), kind, asserted))
    }

    fn query_asserted(&self, subject: &Subject, kind: FactKind) -> StoreResult<FactSet> {
        Ok(of_kind(&self.asserted(subject), kind))
    }

    fn sub_classes(&self, class: &Subject) -> StoreResult<BTreeSet<String>> {
        let hierarchy = self.hierarchy_excluding(None);
        Ok(match self.reasoning {
            Reasoning::None => hierarchy.children(class.name()),
            Reasoning::Hierarchy => hierarchy.descendants(class.name()),
        })
    }

    fn instances(&self, class: &Subject) -> StoreResult<BTreeSet<String>> {
        let mut classes = BTreeSet::from([class.name().to_string()]);
        if self.reasoning == Reasoning::Hierarchy {
            classes.extend(self.hierarchy_excluding(None).descendants(class.name()));
        }
        let instances = self
            .facts
            .iter()
            .filter(|entry| {
                entry.value().iter().any(|f| match f {
                    Fact::Type { class } => classes.contains(class),
                    _ => false,
                })
            })
            .map(|entry| self.namespace.short_name(entry.key()))
            .collect();
        Ok(instances)
    }

    fn apply(&self, subject: &Subject, changes: &ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().map_err(|_| self.poisoned("write"))?;
        let schema = self.schema.read().map_err(|_| self.poisoned("schema"))?;

        let mut hierarchy = self.hierarchy_excluding(Some(subject.iri()));
        let current = self.asserted(subject);
        let candidate = candidate_facts(&current, &changes.assert, &changes.retract);
        add_subclass_edges(&mut hierarchy, subject.name(), &candidate);

        let violations = Reasoner::new(hierarchy, &schema, self.reasoning)
            .check(subject.name(), &candidate);
        if !violations.is_empty() {
            tracing::warn!(
                store = %self.name,
                subject = %subject,
                violations = violations.len(),
                "rejected inconsistent change set"
            );
            return Err(StoreError::Inconsistent {
                violations: violations.iter().map(ToString::to_string).collect(),
            });
        }

        if candidate.is_empty() {
            self.facts.remove(subject.iri());
        } else {
            self.facts.insert(subject.iri().to_string(), candidate);
        }
        tracing::debug!(
            store = %self.name,
            subject = %subject,
            asserted = changes.assert.len(),
            retracted = changes.retract.len(),
            "applied change set"
        );
        Ok(())
    }
}

impl std::fmt::Debug for MemFactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemFactStore")
            .field("name", &self.name)
            .field("ontology", &self.namespace.base())
            .field("reasoning", &self.reasoning)
            .field("subjects", &self.facts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Literal;
    use tempfile::TempDir;

    const ONTO: &str = "http://www.example.org/owloopTest";

    fn changes(assert: &[Fact], retract: &[Fact]) -> ChangeSet {
        ChangeSet {
            assert: assert.iter().cloned().collect(),
            retract: retract.iter().cloned().collect(),
        }
    }

    #[test]
    fn apply_and_query() {
        let store = MemFactStore::new("test", ONTO);
        let robot = store.resolve_name("Robot1");
        assert!(!store.contains_subject(&robot).unwrap());

        store
            .apply(
                &robot,
                &changes(
                    &[
                        Fact::of_type("Robot"),
                        Fact::object("isIn", "Corridor1"),
                        Fact::data("hasBattery", Literal::integer(80)),
                    ],
                    &[],
                ),
            )
            .unwrap();

        assert!(store.contains_subject(&robot).unwrap());
        assert_eq!(store.query(&robot, FactKind::Type).unwrap().len(), 1);
        assert_eq!(store.query(&robot, FactKind::ObjectRelation).unwrap().len(), 1);
        assert_eq!(store.query(&robot, FactKind::DataRelation).unwrap().len(), 1);
        assert!(store.query(&robot, FactKind::SubClassOf).unwrap().is_empty());
    }

    #[test]
    fn retracting_everything_forgets_subject() {
        let store = MemFactStore::new("test", ONTO);
        let robot = store.resolve_name("Robot1");
        store.assert_fact(&robot, &Fact::of_type("Robot")).unwrap();
        store
            .apply(&robot, &changes(&[], &[Fact::of_type("Robot")]))
            .unwrap();
        assert!(!store.contains_subject(&robot).unwrap());
        assert_eq!(store.subject_count(), 0);
    }

    #[test]
    fn hierarchy_reasoning_infers_superclasses() {
        let store = MemFactStore::new("test", ONTO).with_reasoning(Reasoning::Hierarchy);
        let corridor = store.resolve_name("Corridor");
        let location = store.resolve_name("Location");
        let c1 = store.resolve_name("Corridor1");
        store
            .assert_fact(&corridor, &Fact::sub_class_of("Location"))
            .unwrap();
        store
            .assert_fact(&location, &Fact::sub_class_of("Place"))
            .unwrap();
        store.assert_fact(&c1, &Fact::of_type("Corridor")).unwrap();

        let types = store.query(&c1, FactKind::Type).unwrap();
        assert!(types.contains(&Fact::of_type("Location")));
        assert!(types.contains(&Fact::of_type("Place")));
        assert_eq!(
            store.query(&corridor, FactKind::SubClassOf).unwrap().len(),
            2
        );
        assert_eq!(store.asserted(&c1).len(), 1);
    }

    #[test]
    fn class_members_follow_reasoning_mode() {
        let plain = MemFactStore::new("test", ONTO);
        let reasoning = MemFactStore::new("test", ONTO).with_reasoning(Reasoning::Hierarchy);
        for store in [&plain, &reasoning] {
            let corridor = store.resolve_name("Corridor");
            store
                .assert_fact(&corridor, &Fact::sub_class_of("Location"))
                .unwrap();
            store
                .assert_fact(&store.resolve_name("Location"), &Fact::sub_class_of("Place"))
                .unwrap();
            store
                .assert_fact(&store.resolve_name("Corridor1"), &Fact::of_type("Corridor"))
                .unwrap();
            store
                .assert_fact(&store.resolve_name("Place1"), &Fact::of_type("Place"))
                .unwrap();
        }

        let place = plain.resolve_name("Place");
        assert_eq!(plain.sub_classes(&place).unwrap(), BTreeSet::from(["Location".to_string()]));
        assert_eq!(plain.instances(&place).unwrap(), BTreeSet::from(["Place1".to_string()]));
        assert_eq!(reasoning.sub_classes(&place).unwrap().len(), 2);
        assert_eq!(
            reasoning.instances(&place).unwrap(),
            BTreeSet::from(["Corridor1".to_string(), "Place1".to_string()])
        );

        let c1 = reasoning.resolve_name("Corridor1");
        assert_eq!(reasoning.query(&c1, FactKind::Type).unwrap().len(), 3);
        assert_eq!(reasoning.query_asserted(&c1, FactKind::Type).unwrap().len(), 1);
    }

    #[test]
    fn functional_violation_leaves_store_untouched() {
        let store = MemFactStore::new("test", ONTO);
        store.declare_functional("isIn").unwrap();
        let robot = store.resolve_name("Robot1");
        store
            .assert_fact(&robot, &Fact::object("isIn", "Corridor1"))
            .unwrap();

        let err = store
            .apply(
                &robot,
                &changes(&[Fact::object("isIn", "Room1"), Fact::of_type("Robot")], &[]),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent { .. }));
        assert_eq!(store.asserted(&robot).len(), 1);

        // Moving is fine when the old value goes in the same change set.
        store
            .apply(
                &robot,
                &changes(
                    &[Fact::object("isIn", "Room1")],
                    &[Fact::object("isIn", "Corridor1")],
                ),
            )
            .unwrap();
        assert_eq!(
            store.query(&robot, FactKind::ObjectRelation).unwrap(),
            [Fact::object("isIn", "Room1")].into_iter().collect()
        );
    }

    #[test]
    fn disjoint_check_sees_hierarchy() {
        let store = MemFactStore::new("test", ONTO);
        store.declare_disjoint("Location", "Robot").unwrap();
        let corridor = store.resolve_name("Corridor");
        store
            .assert_fact(&corridor, &Fact::sub_class_of("Location"))
            .unwrap();

        let thing = store.resolve_name("Thing1");
        let err = store
            .apply(
                &thing,
                &changes(&[Fact::of_type("Robot"), Fact::of_type("Corridor")], &[]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("disjoint"));
        assert!(!store.contains_subject(&thing).unwrap());
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("owloop.redb");
        {
            let store = MemFactStore::new("owloopTest", ONTO).with_reasoning(Reasoning::Hierarchy);
            store.declare_functional("isIn").unwrap();
            let robot = store.resolve_name("Robot1");
            store.assert_fact(&robot, &Fact::of_type("Robot")).unwrap();
            store
                .assert_fact(&robot, &Fact::object("isIn", "Corridor1"))
                .unwrap();
            store.save(&path).unwrap();
        }

        let store = MemFactStore::load(&path).unwrap();
        assert_eq!(store.name(), "owloopTest");
        assert_eq!(store.ontology_iri(), ONTO);
        assert_eq!(store.reasoning(), Reasoning::Hierarchy);
        assert!(store.schema().unwrap().is_functional("isIn"));
        let robot = store.resolve_name("Robot1");
        assert_eq!(store.asserted(&robot).len(), 2);
        assert_eq!(store.fact_count(), 2);
    }

    #[test]
    fn concurrent_applies_on_distinct_subjects() {
        use std::sync::Arc;
        let store = Arc::new(MemFactStore::new("test", ONTO));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let subject = store.resolve_name(&format!("Robot{i}"));
                    store.assert_fact(&subject, &Fact::of_type("Robot")).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.subject_count(), 16);
    }
}
