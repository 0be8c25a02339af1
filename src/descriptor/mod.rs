//! Descriptors: buffered views of one subject, synchronized on demand.
//!
//! A [`Descriptor`] is grounded on one subject of one [`FactStore`]. Calls
//! such as [`Descriptor::add_fact`] only touch the local buffer; the store
//! sees nothing until [`Descriptor::write_semantic`], and the buffer learns
//! nothing from the store until [`Descriptor::read_semantic`]. The caller
//! decides the order, the descriptor never synchronizes on its own.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ontoloop::descriptor::Descriptor;
//! use ontoloop::fact::Fact;
//! use ontoloop::store::MemFactStore;
//!
//! # fn main() -> ontoloop::error::SyncResult<()> {
//! let store = Arc::new(MemFactStore::new("owloopTest", "http://www.example.org/owloopTest"));
//! let mut robot = Descriptor::individual("Robot1", store);
//! robot.add_fact(Fact::of_type("Robot"))?;
//! robot.add_fact(Fact::object("isIn", "Corridor1"))?;
//! robot.write_semantic()?;
//! robot.read_semantic()?;
//! # Ok(())
//! # }
//! ```

pub mod traverse;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffer::{Capabilities, FactBuffer};
use crate::error::{SyncError, SyncResult};
use crate::export::DescriptorExport;
use crate::fact::{Fact, FactKind, FactSet, Literal};
use crate::store::FactStore;
use crate::subject::{EntityRole, Subject};
use crate::sync::{ChangeSet, SyncDirection, SyncIntent, SyncReport};

pub use traverse::{TraversalConfig, TraversalResult, traverse};

/// What a read does when the store has never heard of the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSubject {
    /// The subject simply has no facts yet.
    #[default]
    Empty,
    /// Fail with [`SyncError::SubjectNotFound`].
    Strict,
}

/// Per-descriptor behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorConfig {
    #[serde(default)]
    pub missing_subject: MissingSubject,
    /// Log sync reports at `info` instead of `debug`.
    #[serde(default)]
    pub trace_sync: bool,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            missing_subject: MissingSubject::Empty,
            trace_sync: false,
        }
    }
}

/// A buffered view of the facts about one subject.
///
/// The type parameter defaults to a trait object so descriptors over
/// different store types can live in one collection.
pub struct Descriptor<S: FactStore + ?Sized = dyn FactStore> {
    store: Arc<S>,
    subject: Subject,
    role: EntityRole,
    capabilities: Capabilities,
    buffer: FactBuffer,
    /// Facts to remove from the store at the next write.
    retractions: FactSet,
    /// Properties relation reads are restricted to. Empty = all.
    focus: BTreeSet<String>,
    config: DescriptorConfig,
}

impl<S: FactStore + ?Sized> Descriptor<S> {
    /// Descriptor with explicit role and capabilities.
    pub fn with_capabilities(
        identifier: &str,
        role: EntityRole,
        capabilities: Capabilities,
        store: Arc<S>,
    ) -> Self {
        let subject = store.resolve_name(identifier);
        Self {
            store,
            subject,
            role,
            capabilities,
            buffer: FactBuffer::new(&capabilities),
            retractions: FactSet::new(),
            focus: BTreeSet::new(),
            config: DescriptorConfig::default(),
        }
    }

    /// Descriptor for an individual: types, object and data relations.
    pub fn individual(identifier: &str, store: Arc<S>) -> Self {
        Self::with_capabilities(
            identifier,
            EntityRole::Individual,
            Capabilities::individual(),
            store,
        )
    }

    /// Descriptor for a class: its superclasses.
    pub fn class(identifier: &str, store: Arc<S>) -> Self {
        Self::with_capabilities(identifier, EntityRole::Class, Capabilities::class(), store)
    }

    pub fn with_config(mut self, config: DescriptorConfig) -> Self {
        self.config = config;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn role(&self) -> EntityRole {
        self.role
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn config(&self) -> DescriptorConfig {
        self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn buffer(&self) -> &FactBuffer {
        &self.buffer
    }

    /// Buffered facts of one kind.
    pub fn facts(&self, kind: FactKind) -> FactSet {
        self.buffer.facts(kind)
    }

    /// Buffered targets of an object property, in order.
    pub fn objects(&self, property: &str) -> Vec<&str> {
        self.buffer
            .iter_kind(FactKind::ObjectRelation)
            .filter_map(|f| match f {
                Fact::ObjectRelation { property: p, target } if p == property => {
                    Some(target.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// First target of an object property. Meant for single-valued ones.
    pub fn object(&self, property: &str) -> Option<&str> {
        self.objects(property).into_iter().next()
    }

    /// Buffered values of a data property, in order.
    pub fn literals(&self, property: &str) -> Vec<&Literal> {
        self.buffer
            .iter_kind(FactKind::DataRelation)
            .filter_map(|f| match f {
                Fact::DataRelation { property: p, value } if p == property => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn literal(&self, property: &str) -> Option<&Literal> {
        self.literals(property).into_iter().next()
    }

    pub fn pending_retractions(&self) -> &FactSet {
        &self.retractions
    }

    /// Serializable snapshot of the buffer.
    pub fn export(&self) -> DescriptorExport {
        DescriptorExport::from_parts(
            &self.subject,
            self.role,
            self.buffer.kinds().map(|k| (k, self.buffer.facts(k))),
            &self.retractions,
        )
    }

    // -----------------------------------------------------------------------
    // Local mutation
    // -----------------------------------------------------------------------

    fn ensure_supported(&self, kind: FactKind) -> SyncResult<()> {
        if self.capabilities.supports(kind) {
            Ok(())
        } else {
            Err(SyncError::UnsupportedFactKind {
                subject: self.subject.name().to_string(),
                kind,
            })
        }
    }

    /// Buffer a fact. Returns whether the buffer changed.
    ///
    /// Adding a fact that was scheduled for retraction cancels the
    /// retraction.
    pub fn add_fact(&mut self, fact: Fact) -> SyncResult<bool> {
        self.ensure_supported(fact.kind())?;
        let uncancelled = self.retractions.remove(&fact);
        Ok(self.buffer.insert(fact) || uncancelled)
    }

    /// Buffer a fact as the only value of its slot.
    ///
    /// Every other buffered fact with the same kind and property is dropped
    /// and scheduled for retraction, so the next write moves the value in
    /// the store instead of adding a second one.
    pub fn add_singleton(&mut self, fact: Fact) -> SyncResult<bool> {
        self.ensure_supported(fact.kind())?;
        let evicted = self.buffer.take_slot(&fact);
        let mut changed = false;
        for old in evicted.iter().filter(|old| **old != fact) {
            self.retractions.insert(old.clone());
            changed = true;
        }
        changed |= self.retractions.remove(&fact);
        changed |= !evicted.contains(&fact);
        self.buffer.insert(fact);
        Ok(changed)
    }

    /// Drop a fact from the buffer and schedule its removal from the store.
    pub fn retract_fact(&mut self, fact: &Fact) -> SyncResult<bool> {
        self.ensure_supported(fact.kind())?;
        let removed = self.buffer.remove(fact);
        let scheduled = self.retractions.insert(fact.clone());
        Ok(removed || scheduled)
    }

    /// Drop a pending retraction without touching the buffer.
    pub fn cancel_retraction(&mut self, fact: &Fact) -> bool {
        self.retractions.remove(fact)
    }

    /// Restrict relation reads to `property` (cumulative).
    pub fn focus_relation(&mut self, property: impl Into<String>) -> &mut Self {
        self.focus.insert(property.into());
        self
    }

    pub fn clear_focus(&mut self) -> &mut Self {
        self.focus.clear();
        self
    }

    fn in_focus(&self, fact: &Fact) -> bool {
        match fact.property() {
            Some(p) if !self.focus.is_empty() => self.focus.contains(p),
            _ => true,
        }
    }

    // -----------------------------------------------------------------------
    // Synchronization
    // -----------------------------------------------------------------------

    fn store_err(&self, err: crate::error::StoreError) -> SyncError {
        SyncError::from_store(self.subject.name(), err)
    }

    fn fetch(&self, kind: FactKind) -> SyncResult<FactSet> {
        self.store
            .query(&self.subject, kind)
            .map_err(|e| self.store_err(e))
    }

    /// Pull the subject's facts from the store into the buffer.
    ///
    /// Store facts are unioned into the buffer: locally added facts that
    /// were not written yet survive, facts pending retraction are not
    /// brought back. Every kind is fetched before the buffer is touched, so
    /// a failing store leaves it unchanged.
    pub fn read_semantic(&mut self) -> SyncResult<SyncReport> {
        if self.config.missing_subject == MissingSubject::Strict {
            let known = self
                .store
                .contains_subject(&self.subject)
                .map_err(|e| self.store_err(e))?;
            if !known {
                return Err(SyncError::SubjectNotFound {
                    subject: self.subject.name().to_string(),
                });
            }
        }

        let mut remote: BTreeMap<FactKind, FactSet> = BTreeMap::new();
        for kind in self.capabilities.kinds() {
            let facts = self
                .fetch(kind)?
                .into_iter()
                .filter(|f| self.in_focus(f) && !self.retractions.contains(f))
                .collect();
            remote.insert(kind, facts);
        }

        let mut report = SyncReport::new(self.subject.iri(), SyncDirection::Read);
        for (kind, facts) in remote {
            let intent = SyncIntent::additive(&facts, &self.buffer.facts(kind));
            for fact in &intent.to_add {
                self.buffer.insert(fact.clone());
            }
            report = report.with_intent(kind, intent);
        }
        self.log_report(&report);
        Ok(report)
    }

    /// Push the buffer to the store.
    ///
    /// Facts the store lacks are asserted and pending retractions it holds
    /// are removed, all in one atomic change set. Writing twice is the same
    /// as writing once. On failure the buffer and the pending retractions
    /// are left as they were.
    pub fn write_semantic(&mut self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(self.subject.iri(), SyncDirection::Write);
        for kind in self.capabilities.kinds() {
            let remote = self.fetch(kind)?;
            let retracted: FactSet = self
                .retractions
                .iter()
                .filter(|f| f.kind() == kind)
                .cloned()
                .collect();
            let asserted = if retracted.is_empty() {
                FactSet::new()
            } else {
                self.store
                    .query_asserted(&self.subject, kind)
                    .map_err(|e| self.store_err(e))?
            };
            // Only asserted facts can be removed; an inferred one would
            // come back on the next read.
            if let Some(inferred) = retracted
                .iter()
                .find(|f| remote.contains(*f) && !asserted.contains(*f))
            {
                return Err(SyncError::WriteRejected {
                    subject: self.subject.name().to_string(),
                    reason: format!(
                        "{inferred} is inferred; retract the asserted fact it follows from"
                    ),
                });
            }
            let intent = SyncIntent::additive(&self.buffer.facts(kind), &remote)
                .with_removals(&retracted, &asserted);
            report = report.with_intent(kind, intent);
        }

        let changes = ChangeSet::from_intents(report.intents.values());
        if !changes.is_empty() {
            self.store
                .apply(&self.subject, &changes)
                .map_err(|e| self.store_err(e))?;
        }
        self.retractions.clear();
        self.log_report(&report);
        Ok(report)
    }

    /// Write, let the store reason if asked, then read the result back.
    pub fn write_then_read(&mut self, reason: bool) -> SyncResult<(SyncReport, SyncReport)> {
        let written = self.write_semantic()?;
        if reason {
            self.store.reason().map_err(|e| self.store_err(e))?;
        }
        let read = self.read_semantic()?;
        Ok((written, read))
    }

    /// The store's authoritative facts of `kind`. The buffer is not touched.
    pub fn query_fact(&self, kind: FactKind) -> SyncResult<FactSet> {
        self.ensure_supported(kind)?;
        self.fetch(kind)
    }

    /// Subclasses of this class according to the store. Transitive when
    /// the store reasons over the hierarchy.
    pub fn query_sub_classes(&self) -> SyncResult<BTreeSet<String>> {
        self.ensure_supported(FactKind::SubClassOf)?;
        self.store
            .sub_classes(&self.subject)
            .map_err(|e| self.store_err(e))
    }

    /// Individuals of this class according to the store.
    pub fn query_instances(&self) -> SyncResult<BTreeSet<String>> {
        self.ensure_supported(FactKind::SubClassOf)?;
        self.store
            .instances(&self.subject)
            .map_err(|e| self.store_err(e))
    }

    /// One freshly read class descriptor per subclass, in name order.
    pub fn build_sub_classes(&self) -> SyncResult<Vec<Descriptor<S>>> {
        self.query_sub_classes()?
            .into_iter()
            .map(|name| {
                let mut sub = self.spawn(&name, FactKind::SubClassOf);
                sub.read_semantic()?;
                Ok(sub)
            })
            .collect()
    }

    /// One freshly read individual descriptor per instance, in name order.
    pub fn build_instances(&self) -> SyncResult<Vec<Descriptor<S>>> {
        self.query_instances()?
            .into_iter()
            .map(|name| {
                let mut instance = self.spawn(&name, FactKind::ObjectRelation);
                instance.read_semantic()?;
                Ok(instance)
            })
            .collect()
    }

    /// One freshly read descriptor per subject the buffered facts of `kind`
    /// point at, in name order.
    ///
    /// Object relation targets become individuals; type and subclass
    /// targets become classes. Data relations point at literals and are
    /// refused.
    pub fn build_related(&self, kind: FactKind) -> SyncResult<Vec<Descriptor<S>>> {
        self.ensure_supported(kind)?;
        if !kind.is_relational() {
            return Err(SyncError::UnsupportedFactKind {
                subject: self.subject.name().to_string(),
                kind,
            });
        }
        self.related_names(kind)
            .into_iter()
            .map(|name| {
                let mut related = self.spawn(&name, kind);
                related.read_semantic()?;
                Ok(related)
            })
            .collect()
    }

    /// Names of the subjects buffered facts of `kind` point at.
    pub(crate) fn related_names(&self, kind: FactKind) -> BTreeSet<String> {
        self.buffer
            .iter_kind(kind)
            .filter_map(Fact::related)
            .map(String::from)
            .collect()
    }

    /// Unread descriptor for a subject reached through a fact of `kind`.
    pub(crate) fn spawn(&self, name: &str, kind: FactKind) -> Descriptor<S> {
        let related = match kind {
            FactKind::ObjectRelation => Descriptor::individual(name, Arc::clone(&self.store)),
            _ => Descriptor::class(name, Arc::clone(&self.store)),
        };
        related.with_config(self.config)
    }

    fn log_report(&self, report: &SyncReport) {
        if self.config.trace_sync {
            tracing::info!(
                subject = %self.subject,
                direction = %report.direction,
                added = report.added(),
                removed = report.removed(),
                "{report}"
            );
        } else {
            tracing::debug!(
                subject = %self.subject,
                direction = %report.direction,
                added = report.added(),
                removed = report.removed(),
                "{report}"
            );
        }
    }
}

impl<S: FactStore + ?Sized> Clone for Descriptor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            subject: self.subject.clone(),
            role: self.role,
            capabilities: self.capabilities,
            buffer: self.buffer.clone(),
            retractions: self.retractions.clone(),
            focus: self.focus.clone(),
            config: self.config,
        }
    }
}

impl<S: FactStore + ?Sized> std::fmt::Debug for Descriptor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("store", &self.store.name())
            .field("subject", &self.subject.iri())
            .field("role", &self.role)
            .field("facts", &self.buffer.len())
            .field("pending_retractions", &self.retractions.len())
            .finish()
    }
}

impl<S: FactStore + ?Sized> std::fmt::Display for Descriptor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {}", self.role, self.subject)?;
        for kind in self.buffer.kinds() {
            for fact in self.buffer.iter_kind(kind) {
                writeln!(f, "  {fact}")?;
            }
        }
        Ok(())
    }
}
