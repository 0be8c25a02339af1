//! Structural reasoning shared by the store adapters.
//!
//! This is not an OWL reasoner. It covers what the descriptor protocol needs
//! from one:
//!
//! - **Hierarchy closure**: with [`Reasoning::Hierarchy`], an individual of
//!   `Corridor` is also reported as a `Location`, and a class reports all of
//!   its transitive superclasses.
//! - **Consistency**: a change set is rejected when it gives a functional
//!   property two targets, or makes an individual an instance of two
//!   disjoint classes (directly or through the hierarchy).
//!
//! Violations are returned, not raised; stores turn them into
//! [`StoreError::Inconsistent`](crate::error::StoreError::Inconsistent).

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed, Walker};
use serde::{Deserialize, Serialize};

use crate::fact::{Fact, FactKind, FactSet};

/// Which inferences a store adds to query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reasoning {
    /// Only asserted facts are returned.
    #[default]
    None,
    /// Type and subclass queries include superclasses.
    Hierarchy,
}

/// Schema-level axioms the consistency check enforces.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    functional: BTreeSet<String>,
    /// Unordered pairs, stored smallest-first.
    disjoint: BTreeSet<(String, String)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an object or data property functional (at most one value).
    pub fn declare_functional(&mut self, property: impl Into<String>) -> &mut Self {
        self.functional.insert(property.into());
        self
    }

    /// Declare two classes disjoint (no shared instances).
    pub fn declare_disjoint(&mut self, a: impl Into<String>, b: impl Into<String>) -> &mut Self {
        let (a, b) = (a.into(), b.into());
        let pair = if a <= b { (a, b) } else { (b, a) };
        self.disjoint.insert(pair);
        self
    }

    pub fn is_functional(&self, property: &str) -> bool {
        self.functional.contains(property)
    }

    pub fn are_disjoint(&self, a: &str, b: &str) -> bool {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        self.disjoint.contains(&(a.to_string(), b.to_string()))
    }

    pub fn functional_properties(&self) -> impl Iterator<Item = &str> {
        self.functional.iter().map(String::as_str)
    }

    pub fn disjoint_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.disjoint.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.functional.is_empty() && self.disjoint.is_empty()
    }
}

/// Subclass graph: edges point from subclass to superclass.
#[derive(Debug, Default)]
pub struct ClassHierarchy {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(subclass, superclass)` pairs.
    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut hierarchy = Self::new();
        for (sub, sup) in edges {
            hierarchy.add_edge(sub, sup);
        }
        hierarchy
    }

    fn ensure_node(&mut self, class: String) -> NodeIndex {
        if let Some(&idx) = self.index.get(&class) {
            return idx;
        }
        let idx = self.graph.add_node(class.clone());
        self.index.insert(class, idx);
        idx
    }

    pub fn add_edge(&mut self, sub: impl Into<String>, sup: impl Into<String>) {
        let sub = self.ensure_node(sub.into());
        let sup = self.ensure_node(sup.into());
        if self.graph.find_edge(sub, sup).is_none() {
            self.graph.add_edge(sub, sup, ());
        }
    }

    /// All transitive superclasses of `class`, excluding `class` itself.
    ///
    /// Cycles are tolerated: every class is visited once.
    pub fn ancestors(&self, class: &str) -> BTreeSet<String> {
        let Some(&start) = self.index.get(class) else {
            return BTreeSet::new();
        };
        Dfs::new(&self.graph, start)
            .iter(&self.graph)
            .filter(|&idx| idx != start)
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Direct subclasses of `class`.
    pub fn children(&self, class: &str) -> BTreeSet<String> {
        let Some(&idx) = self.index.get(class) else {
            return BTreeSet::new();
        };
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// All transitive subclasses of `class`, excluding `class` itself.
    pub fn descendants(&self, class: &str) -> BTreeSet<String> {
        let Some(&start) = self.index.get(class) else {
            return BTreeSet::new();
        };
        let reversed = Reversed(&self.graph);
        Dfs::new(reversed, start)
            .iter(reversed)
            .filter(|&idx| idx != start)
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// The given classes plus all of their superclasses.
    pub fn closure<'a>(&self, classes: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for class in classes {
            out.insert(class.to_string());
            out.extend(self.ancestors(class));
        }
        out
    }

    pub fn class_count(&self) -> usize {
        self.graph.node_count()
    }
}

/// A consistency rule broken by a candidate fact set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A functional property would hold more than one value.
    Functional {
        subject: String,
        property: String,
        values: Vec<String>,
    },
    /// An individual would be an instance of two disjoint classes.
    Disjoint {
        subject: String,
        class_a: String,
        class_b: String,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Functional {
                subject,
                property,
                values,
            } => write!(
                f,
                "functional property {property} of {subject} would have {} values ({})",
                values.len(),
                values.join(", ")
            ),
            Violation::Disjoint {
                subject,
                class_a,
                class_b,
            } => write!(
                f,
                "{subject} cannot be both {class_a} and {class_b} (disjoint classes)"
            ),
        }
    }
}

/// Hierarchy plus schema, evaluated against one subject at a time.
#[derive(Debug)]
pub struct Reasoner<'a> {
    pub hierarchy: ClassHierarchy,
    pub schema: &'a Schema,
    pub mode: Reasoning,
}

impl<'a> Reasoner<'a> {
    pub fn new(hierarchy: ClassHierarchy, schema: &'a Schema, mode: Reasoning) -> Self {
        Self {
            hierarchy,
            schema,
            mode,
        }
    }

    /// Add inferred facts of `kind` to the asserted ones.
    ///
    /// `subject` is the subject's short name; it matters for subclass
    /// queries, where the subject itself is the class being expanded.
    pub fn expand(&self, subject: &str, kind: FactKind, asserted: FactSet) -> FactSet {
        if self.mode == Reasoning::None {
            return asserted;
        }
        match kind {
            FactKind::Type => {
                let classes: Vec<&str> = asserted.iter().filter_map(type_class).collect();
                self.hierarchy
                    .closure(classes)
                    .into_iter()
                    .map(Fact::of_type)
                    .chain(asserted.iter().cloned())
                    .collect()
            }
            FactKind::SubClassOf => self
                .hierarchy
                .ancestors(subject)
                .into_iter()
                .map(Fact::sub_class_of)
                .chain(asserted.iter().cloned())
                .collect(),
            FactKind::ObjectRelation | FactKind::DataRelation => asserted,
        }
    }

    /// Check the full fact set a subject would have after a write.
    pub fn check(&self, subject: &str, candidate: &FactSet) -> Vec<Violation> {
        let mut violations = Vec::new();

        for property in self.schema.functional_properties() {
            let values: Vec<String> = candidate
                .iter()
                .filter(|f| f.property() == Some(property))
                .map(|f| match f {
                    Fact::ObjectRelation { target, .. } => target.clone(),
                    Fact::DataRelation { value, .. } => value.to_string(),
                    _ => String::new(),
                })
                .collect();
            if values.len() > 1 {
                violations.push(Violation::Functional {
                    subject: subject.to_string(),
                    property: property.to_string(),
                    values,
                });
            }
        }

        let types = self
            .hierarchy
            .closure(candidate.iter().filter_map(type_class));
        for (a, b) in self.schema.disjoint_pairs() {
            if types.contains(a) && types.contains(b) {
                violations.push(Violation::Disjoint {
                    subject: subject.to_string(),
                    class_a: a.to_string(),
                    class_b: b.to_string(),
                });
            }
        }

        violations
    }
}

fn type_class(fact: &Fact) -> Option<&str> {
    match fact {
        Fact::Type { class } => Some(class),
        _ => None,
    }
}

/// Apply a change set to a copy of the current facts.
pub fn candidate_facts(current: &FactSet, assert: &FactSet, retract: &FactSet) -> FactSet {
    current
        .iter()
        .filter(|f| !retract.contains(*f))
        .chain(assert.iter())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locations() -> ClassHierarchy {
        ClassHierarchy::from_edges([
            ("Corridor", "Location"),
            ("Room", "Location"),
            ("Location", "Place"),
        ])
    }

    fn set(facts: &[Fact]) -> FactSet {
        facts.iter().cloned().collect()
    }

    #[test]
    fn ancestors_are_transitive() {
        let h = locations();
        let anc = h.ancestors("Corridor");
        assert_eq!(
            anc,
            ["Location", "Place"].into_iter().map(String::from).collect()
        );
        assert!(h.ancestors("Place").is_empty());
        assert!(h.ancestors("Unknown").is_empty());
        assert_eq!(h.children("Location").len(), 2);
    }

    #[test]
    fn descendants_walk_down() {
        let h = locations();
        let below: Vec<String> = h.descendants("Place").into_iter().collect();
        assert_eq!(below, ["Corridor", "Location", "Room"]);
        assert!(h.descendants("Corridor").is_empty());
        assert!(h.descendants("Unknown").is_empty());
    }

    #[test]
    fn cycles_terminate() {
        let h = ClassHierarchy::from_edges([("A", "B"), ("B", "C"), ("C", "A")]);
        let anc = h.ancestors("A");
        assert_eq!(anc.len(), 2);
        assert!(!anc.contains("A"));
    }

    #[test]
    fn type_expansion_adds_superclasses() {
        let schema = Schema::new();
        let reasoner = Reasoner::new(locations(), &schema, Reasoning::Hierarchy);
        let types = reasoner.expand(
            "Corridor1",
            FactKind::Type,
            set(&[Fact::of_type("Corridor")]),
        );
        assert_eq!(
            types,
            set(&[
                Fact::of_type("Corridor"),
                Fact::of_type("Location"),
                Fact::of_type("Place"),
            ])
        );
    }

    #[test]
    fn no_reasoning_returns_asserted() {
        let schema = Schema::new();
        let reasoner = Reasoner::new(locations(), &schema, Reasoning::None);
        let asserted = set(&[Fact::of_type("Corridor")]);
        assert_eq!(
            reasoner.expand("Corridor1", FactKind::Type, asserted.clone()),
            asserted
        );
    }

    #[test]
    fn subclass_expansion_uses_subject() {
        let schema = Schema::new();
        let reasoner = Reasoner::new(locations(), &schema, Reasoning::Hierarchy);
        let supers = reasoner.expand(
            "Corridor",
            FactKind::SubClassOf,
            set(&[Fact::sub_class_of("Location")]),
        );
        assert!(supers.contains(&Fact::sub_class_of("Place")));
        assert_eq!(supers.len(), 2);
    }

    #[test]
    fn functional_violation_detected() {
        let mut schema = Schema::new();
        schema.declare_functional("isIn");
        let reasoner = Reasoner::new(ClassHierarchy::new(), &schema, Reasoning::None);
        let ok = set(&[Fact::object("isIn", "Corridor1")]);
        assert!(reasoner.check("Robot1", &ok).is_empty());

        let bad = set(&[
            Fact::object("isIn", "Corridor1"),
            Fact::object("isIn", "Room1"),
        ]);
        let violations = reasoner.check("Robot1", &bad);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].to_string().contains("isIn"));
    }

    #[test]
    fn disjoint_violation_through_hierarchy() {
        let mut schema = Schema::new();
        schema.declare_disjoint("Place", "Robot");
        let reasoner = Reasoner::new(locations(), &schema, Reasoning::None);
        let bad = set(&[Fact::of_type("Robot"), Fact::of_type("Corridor")]);
        let violations = reasoner.check("Thing1", &bad);
        assert!(matches!(violations[0], Violation::Disjoint { .. }));
        assert!(schema.are_disjoint("Robot", "Place"));
    }

    #[test]
    fn candidate_applies_retractions_first() {
        let current = set(&[Fact::object("isIn", "Room1")]);
        let candidate = candidate_facts(
            &current,
            &set(&[Fact::object("isIn", "Corridor1")]),
            &set(&[Fact::object("isIn", "Room1")]),
        );
        assert_eq!(candidate, set(&[Fact::object("isIn", "Corridor1")]));
    }
}
