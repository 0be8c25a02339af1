//! External fact stores.
//!
//! Descriptors talk to their store only through the narrow [`FactStore`]
//! interface: resolve a name, query the facts of one kind about a subject,
//! and apply a change set atomically. Two adapters ship with the crate:
//!
//! - [`MemFactStore`]: facts in a concurrent hashmap (DashMap), saved to and
//!   loaded from redb snapshot files ([`durable`])
//! - [`SparqlFactStore`]: facts as RDF triples in oxigraph, in memory or on
//!   disk
//!
//! Both run the structural [`Reasoner`](crate::reason::Reasoner) to infer
//! superclasses and to reject inconsistent writes.

pub mod durable;
pub mod mem;
pub mod sparql;

pub use mem::MemFactStore;
pub use sparql::SparqlFactStore;

use std::collections::BTreeSet;

use crate::error::StoreError;
use crate::fact::{Fact, FactKind, FactSet};
use crate::subject::Subject;
use crate::sync::ChangeSet;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// An authoritative fact base reachable by name.
///
/// Implementations must be safe to share between descriptors (`Arc`), and
/// must apply each [`ChangeSet`] all-or-nothing: either every assertion and
/// retraction lands, or the store is untouched and an error is returned.
pub trait FactStore: Send + Sync {
    /// Reference name of the store (`owloopTest`).
    fn name(&self) -> &str;

    /// IRI of the ontology the store holds.
    fn ontology_iri(&self) -> &str;

    /// Resolve a short name or IRI to a subject of this store.
    fn resolve_name(&self, identifier: &str) -> Subject;

    /// Whether any fact about `subject` is asserted.
    fn contains_subject(&self, subject: &Subject) -> StoreResult<bool>;

    /// Facts of `kind` about `subject`, including inferred ones when the
    /// store reasons.
    fn query(&self, subject: &Subject, kind: FactKind) -> StoreResult<FactSet>;

    /// Facts of `kind` about `subject` as asserted, without inference.
    ///
    /// Stores that never reason can rely on the default.
    fn query_asserted(&self, subject: &Subject, kind: FactKind) -> StoreResult<FactSet> {
        self.query(subject, kind)
    }

    /// Short names of the subclasses of `class`: direct ones, or all
    /// transitive ones when the store reasons over the hierarchy.
    fn sub_classes(&self, class: &Subject) -> StoreResult<BTreeSet<String>>;

    /// Short names of the individuals typed with `class`, including
    /// instances of its subclasses when the store reasons.
    fn instances(&self, class: &Subject) -> StoreResult<BTreeSet<String>>;

    /// Apply assertions and retractions about `subject` atomically.
    fn apply(&self, subject: &Subject, changes: &ChangeSet) -> StoreResult<()>;

    /// Assert a single fact.
    fn assert_fact(&self, subject: &Subject, fact: &Fact) -> StoreResult<()> {
        let mut changes = ChangeSet::default();
        changes.assert.insert(fact.clone());
        self.apply(subject, &changes)
    }

    /// Refresh inferences. A no-op for stores that reason on every query.
    fn reason(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Keep only the facts of one kind.
pub(crate) fn of_kind(facts: &FactSet, kind: FactKind) -> FactSet {
    facts.iter().filter(|f| f.kind() == kind).cloned().collect()
}
