//! RDF fact store backed by oxigraph.
//!
//! Facts become triples in the default graph: `rdf:type` for type
//! membership, `rdfs:subClassOf` for subclass axioms, the property IRI for
//! object and data relations (data values are typed literals). Schema
//! axioms live next to the data as `owl:FunctionalProperty` and
//! `owl:disjointWith` triples, so an on-disk store keeps them across
//! restarts. Hierarchy reasoning is answered with SPARQL property paths.

use std::collections::BTreeSet;
use std::sync::Mutex;

use oxigraph::model::{GraphName, Literal as RdfLiteral, NamedNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::StoreError;
use crate::fact::{Datatype, Fact, FactKind, FactSet, Literal};
use crate::reason::{ClassHierarchy, Reasoner, Reasoning, Schema, candidate_facts};
use crate::subject::{Namespace, Subject};
use crate::sync::ChangeSet;

use super::{FactStore, StoreResult};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
const OWL_FUNCTIONAL: &str = "http://www.w3.org/2002/07/owl#FunctionalProperty";
const OWL_DISJOINT_WITH: &str = "http://www.w3.org/2002/07/owl#disjointWith";

/// Persistent or in-memory RDF fact store.
pub struct SparqlFactStore {
    name: String,
    namespace: Namespace,
    reasoning: Reasoning,
    store: Store,
    write_lock: Mutex<()>,
}

impl SparqlFactStore {
    /// Create a new in-memory store (no persistence).
    pub fn in_memory(name: impl Into<String>, ontology_iri: impl Into<String>) -> StoreResult<Self> {
        let store = Store::new().map_err(|e| StoreError::Sparql {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self::from_store(name.into(), ontology_iri.into(), store))
    }

    /// Open or create a persistent store in the given directory.
    pub fn open(
        name: impl Into<String>,
        ontology_iri: impl Into<String>,
        path: &std::path::Path,
    ) -> StoreResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::Io { source: e })?;
        let store = Store::open(path).map_err(|e| StoreError::Sparql {
            message: format!("failed to open oxigraph store at {}: {e}", path.display()),
        })?;
        Ok(Self::from_store(name.into(), ontology_iri.into(), store))
    }

    fn from_store(name: String, ontology_iri: String, store: Store) -> Self {
        Self {
            name,
            namespace: Namespace::new(ontology_iri),
            reasoning: Reasoning::None,
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_reasoning(mut self, reasoning: Reasoning) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn reasoning(&self) -> Reasoning {
        self.reasoning
    }

    /// Declare a property functional by asserting `owl:FunctionalProperty`.
    pub fn declare_functional(&self, property: &str) -> StoreResult<()> {
        let quad = Quad::new(
            self.node(property)?,
            named(RDF_TYPE)?,
            named(OWL_FUNCTIONAL)?,
            GraphName::DefaultGraph,
        );
        self.insert_quad(&quad)
    }

    /// Declare two classes disjoint by asserting `owl:disjointWith`.
    pub fn declare_disjoint(&self, a: &str, b: &str) -> StoreResult<()> {
        let quad = Quad::new(
            self.node(a)?,
            named(OWL_DISJOINT_WITH)?,
            self.node(b)?,
            GraphName::DefaultGraph,
        );
        self.insert_quad(&quad)
    }

    /// The schema axioms currently asserted in the graph.
    pub fn schema(&self) -> StoreResult<Schema> {
        let mut schema = Schema::new();
        let functional = self.select(
            &format!("SELECT ?p WHERE {{ ?p <{RDF_TYPE}> <{OWL_FUNCTIONAL}> }}"),
            &["p"],
        )?;
        for row in functional {
            if let Some(Term::NamedNode(p)) = &row[0] {
                schema.declare_functional(self.namespace.short_name(p.as_str()));
            }
        }
        let disjoint = self.select(
            &format!("SELECT ?a ?b WHERE {{ ?a <{OWL_DISJOINT_WITH}> ?b }}"),
            &["a", "b"],
        )?;
        for row in disjoint {
            if let (Some(Term::NamedNode(a)), Some(Term::NamedNode(b))) = (&row[0], &row[1]) {
                schema.declare_disjoint(
                    self.namespace.short_name(a.as_str()),
                    self.namespace.short_name(b.as_str()),
                );
            }
        }
        Ok(schema)
    }

    /// Facts asserted about `subject`, without inference.
    pub fn asserted(&self, subject: &Subject) -> StoreResult<FactSet> {
        let mut facts = FactSet::new();
        for kind in FactKind::ALL {
            facts.extend(self.query_kind(subject, kind, Reasoning::None)?);
        }
        Ok(facts)
    }

    /// Number of triples in the store, schema included.
    pub fn len(&self) -> StoreResult<usize> {
        self.store.len().map_err(|e| StoreError::Sparql {
            message: format!("len failed: {e}"),
        })
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        self.len().map(|n| n == 0)
    }

    fn node(&self, identifier: &str) -> StoreResult<NamedNode> {
        named(&self.namespace.iri(identifier))
    }

    fn insert_quad(&self, quad: &Quad) -> StoreResult<()> {
        self.store.insert(quad).map_err(|e| StoreError::Sparql {
            message: format!("insert failed: {e}"),
        })?;
        Ok(())
    }

    fn remove_quad(&self, quad: &Quad) -> StoreResult<()> {
        self.store.remove(quad).map_err(|e| StoreError::Sparql {
            message: format!("remove failed: {e}"),
        })?;
        Ok(())
    }

    /// Run a SELECT query and return the requested variables per solution.
    #[allow(deprecated)]
    fn select(&self, sparql: &str, vars: &[&str]) -> StoreResult<Vec<Vec<Option<Term>>>> {
        let results = self.store.query(sparql).map_err(|e| StoreError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;
        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| StoreError::Sparql {
                        message: format!("solution error: {e}"),
                    })?;
                    rows.push(vars.iter().map(|v| solution.get(*v).cloned()).collect());
                }
                Ok(rows)
            }
            _ => Err(StoreError::Sparql {
                message: "expected solutions from SELECT query".into(),
            }),
        }
    }

    #[allow(deprecated)]
    fn ask(&self, sparql: &str) -> StoreResult<bool> {
        let results = self.store.query(sparql).map_err(|e| StoreError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;
        match results {
            QueryResults::Boolean(b) => Ok(b),
            _ => Err(StoreError::Sparql {
                message: "expected boolean result from ASK query".into(),
            }),
        }
    }

    fn query_kind(&self, subject: &Subject, kind: FactKind, mode: Reasoning) -> StoreResult<FactSet> {
        let s = subject.iri();
        let hierarchy = mode == Reasoning::Hierarchy;
        let mut facts = FactSet::new();
        match kind {
            FactKind::Type => {
                let path = if hierarchy {
                    format!("<{RDF_TYPE}>/<{RDFS_SUBCLASS_OF}>*")
                } else {
                    format!("<{RDF_TYPE}>")
                };
                let rows = self.select(
                    &format!(
                        "SELECT DISTINCT ?c WHERE {{ <{s}> {path} ?c . \
                         FILTER(isIRI(?c) && ?c != <{OWL_FUNCTIONAL}>) }}"
                    ),
                    &["c"],
                )?;
                for row in rows {
                    if let Some(Term::NamedNode(c)) = &row[0] {
                        facts.insert(Fact::of_type(self.namespace.short_name(c.as_str())));
                    }
                }
            }
            FactKind::SubClassOf => {
                let path = if hierarchy {
                    format!("<{RDFS_SUBCLASS_OF}>+")
                } else {
                    format!("<{RDFS_SUBCLASS_OF}>")
                };
                let rows = self.select(
                    &format!(
                        "SELECT DISTINCT ?c WHERE {{ <{s}> {path} ?c . FILTER(isIRI(?c) && ?c != <{s}>) }}"
                    ),
                    &["c"],
                )?;
                for row in rows {
                    if let Some(Term::NamedNode(c)) = &row[0] {
                        facts.insert(Fact::sub_class_of(self.namespace.short_name(c.as_str())));
                    }
                }
            }
            FactKind::ObjectRelation => {
                let rows = self.select(
                    &format!(
                        "SELECT ?p ?o WHERE {{ <{s}> ?p ?o . FILTER(isIRI(?o) && \
                         ?p != <{RDF_TYPE}> && ?p != <{RDFS_SUBCLASS_OF}> && \
                         ?p != <{OWL_DISJOINT_WITH}>) }}"
                    ),
                    &["p", "o"],
                )?;
                for row in rows {
                    if let (Some(Term::NamedNode(p)), Some(Term::NamedNode(o))) = (&row[0], &row[1]) {
                        facts.insert(Fact::object(
                            self.namespace.short_name(p.as_str()),
                            self.namespace.short_name(o.as_str()),
                        ));
                    }
                }
            }
            FactKind::DataRelation => {
                let rows = self.select(
                    &format!("SELECT ?p ?o WHERE {{ <{s}> ?p ?o . FILTER(isLiteral(?o)) }}"),
                    &["p", "o"],
                )?;
                for row in rows {
                    if let (Some(Term::NamedNode(p)), Some(Term::Literal(o))) = (&row[0], &row[1]) {
                        let value = match o.language() {
                            Some(lang) => Literal::lang_string(o.value(), lang),
                            None => {
                                Literal::new(o.value(), Datatype::from_iri(o.datatype().as_str()))
                            }
                        };
                        facts.insert(Fact::data(self.namespace.short_name(p.as_str()), value));
                    }
                }
            }
        }
        Ok(facts)
    }

    /// Short names bound to `?x` by a SELECT over named nodes.
    fn names(&self, sparql: &str) -> StoreResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for row in self.select(sparql, &["x"])? {
            if let Some(Term::NamedNode(x)) = &row[0] {
                names.insert(self.namespace.short_name(x.as_str()));
            }
        }
        Ok(names)
    }

    /// Subclass graph over every asserted `rdfs:subClassOf` triple whose
    /// subject is not `skip`.
    fn hierarchy_excluding(&self, skip: &Subject) -> StoreResult<ClassHierarchy> {
        let rows = self.select(
            &format!("SELECT ?sub ?sup WHERE {{ ?sub <{RDFS_SUBCLASS_OF}> ?sup }}"),
            &["sub", "sup"],
        )?;
        let mut hierarchy = ClassHierarchy::new();
        for row in rows {
            if let (Some(Term::NamedNode(sub)), Some(Term::NamedNode(sup))) = (&row[0], &row[1]) {
                if sub.as_str() == skip.iri() {
                    continue;
                }
                hierarchy.add_edge(
                    self.namespace.short_name(sub.as_str()),
                    self.namespace.short_name(sup.as_str()),
                );
            }
        }
        Ok(hierarchy)
    }

    fn to_quad(&self, subject: &Subject, fact: &Fact) -> StoreResult<Quad> {
        let s = named(subject.iri())?;
        let (p, o): (NamedNode, Term) = match fact {
            Fact::Type { class } => (named(RDF_TYPE)?, self.node(class)?.into()),
            Fact::SubClassOf { class } => (named(RDFS_SUBCLASS_OF)?, self.node(class)?.into()),
            Fact::ObjectRelation { property, target } => {
                (self.node(property)?, self.node(target)?.into())
            }
            Fact::DataRelation { property, value } => {
                (self.node(property)?, rdf_literal(value)?.into())
            }
        };
        Ok(Quad::new(s, p, o, GraphName::DefaultGraph))
    }

    /// Undo already-applied operations after a storage failure.
    fn roll_back(&self, applied: &[(bool, Quad)]) {
        for (inserted, quad) in applied.iter().rev() {
            let undo = if *inserted {
                self.remove_quad(quad)
            } else {
                self.insert_quad(quad)
            };
            if let Err(e) = undo {
                tracing::error!(store = %self.name, error = %e, "rollback step failed");
            }
        }
    }
}

fn rdf_literal(value: &Literal) -> StoreResult<RdfLiteral> {
    match (value.language(), value.datatype()) {
        (Some(lang), _) => RdfLiteral::new_language_tagged_literal(value.lexical(), lang)
            .map_err(|e| StoreError::Sparql {
                message: format!("invalid language tag \"{lang}\": {e}"),
            }),
        (None, Datatype::LangString) => Err(StoreError::Sparql {
            message: format!("language-tagged literal {value} has no tag"),
        }),
        (None, datatype) => Ok(RdfLiteral::new_typed_literal(
            value.lexical(),
            named(datatype.iri())?,
        )),
    }
}

fn named(iri: &str) -> StoreResult<NamedNode> {
    NamedNode::new(iri).map_err(|e| StoreError::Sparql {
        message: format!("invalid IRI \"{iri}\": {e}"),
    })
}

impl FactStore for SparqlFactStore {
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
        named(subject.iri())?;
        // Schema axioms alone do not make a subject known.
        self.ask(&format!(
            "ASK {{ <{}> ?p ?o . FILTER(?p != <{OWL_DISJOINT_WITH}> && \
             !(?p = <{RDF_TYPE}> && ?o = <{OWL_FUNCTIONAL}>)) }}",
            subject.iri()
        ))
    }

    fn query(&self, subject: &Subject, kind: FactKind) -> StoreResult<FactSet> {
        named(subject.iri())?;
        self.query_kind(subject, kind, self.reasoning)
    }

    fn query_asserted(&self, subject: &Subject, kind: FactKind) -> StoreResult<FactSet> {
        named(subject.iri())?;
        self.query_kind(subject, kind, Reasoning::None)
    }

    fn sub_classes(&self, class: &Subject) -> StoreResult<BTreeSet<String>> {
        let c = named(class.iri())?;
        let path = match self.reasoning {
            Reasoning::None => format!("<{RDFS_SUBCLASS_OF}>"),
            Reasoning::Hierarchy => format!("<{RDFS_SUBCLASS_OF}>+"),
        };
        self.names(&format!(
            "SELECT DISTINCT ?x WHERE {{ ?x {path} {c} . FILTER(isIRI(?x) && ?x != {c}) }}"
        ))
    }

    fn instances(&self, class: &Subject) -> StoreResult<BTreeSet<String>> {
        let c = named(class.iri())?;
        let path = match self.reasoning {
            Reasoning::None => format!("<{RDF_TYPE}>"),
            Reasoning::Hierarchy => format!("<{RDF_TYPE}>/<{RDFS_SUBCLASS_OF}>*"),
        };
        self.names(&format!(
            "SELECT DISTINCT ?x WHERE {{ ?x {path} {c} . FILTER(isIRI(?x)) }}"
        ))
    }

    fn apply(&self, subject: &Subject, changes: &ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Unavailable {
            store: self.name.clone(),
            message: "write lock poisoned".into(),
        })?;

        let schema = self.schema()?;
        let mut hierarchy = self.hierarchy_excluding(subject)?;
        let current = self.asserted(subject)?;
        let candidate = candidate_facts(&current, &changes.assert, &changes.retract);
        for fact in &candidate {
            if let Fact::SubClassOf { class } = fact {
                hierarchy.add_edge(subject.name(), class.as_str());
            }
        }
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

        let mut ops = Vec::with_capacity(changes.retract.len() + changes.assert.len());
        for fact in changes.retract.iter().filter(|f| current.contains(*f)) {
            ops.push((false, self.to_quad(subject, fact)?));
        }
        for fact in changes.assert.iter().filter(|f| !current.contains(*f)) {
            ops.push((true, self.to_quad(subject, fact)?));
        }

        let mut applied = Vec::with_capacity(ops.len());
        for (insert, quad) in ops {
            let result = if insert {
                self.insert_quad(&quad)
            } else {
                self.remove_quad(&quad)
            };
            if let Err(e) = result {
                self.roll_back(&applied);
                return Err(e);
            }
            applied.push((insert, quad));
        }

        tracing::debug!(
            store = %self.name,
            subject = %subject,
            triples = applied.len(),
            "applied change set"
        );
        Ok(())
    }
}

impl std::fmt::Debug for SparqlFactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlFactStore")
            .field("name", &self.name)
            .field("ontology", &self.namespace.base())
            .field("reasoning", &self.reasoning)
            .finish()
    }
}
