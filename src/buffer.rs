//! Local fact buffers.
//!
//! A descriptor does not hold one undifferentiated bag of facts. It holds one
//! sub-buffer per fact kind it is capable of, selected at construction by
//! [`Capabilities`]. Each sub-buffer is a set, so adding the same fact twice
//! is a no-op.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fact::{Fact, FactKind, FactSet};

/// The fact kinds a descriptor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub types: bool,
    pub object_relations: bool,
    pub data_relations: bool,
    pub sub_classes: bool,
}

impl Capabilities {
    /// Type membership plus object and data relations: what an individual has.
    pub fn individual() -> Self {
        Self {
            types: true,
            object_relations: true,
            data_relations: true,
            sub_classes: false,
        }
    }

    /// Subclass axioms: what a class has.
    pub fn class() -> Self {
        Self {
            sub_classes: true,
            ..Default::default()
        }
    }

    /// Exactly the given kinds.
    pub fn only(kinds: &[FactKind]) -> Self {
        kinds.iter().fold(Self::default(), |caps, &k| caps.with(k))
    }

    /// Add one kind.
    pub fn with(mut self, kind: FactKind) -> Self {
        match kind {
            FactKind::Type => self.types = true,
            FactKind::ObjectRelation => self.object_relations = true,
            FactKind::DataRelation => self.data_relations = true,
            FactKind::SubClassOf => self.sub_classes = true,
        }
        self
    }

    pub fn supports(&self, kind: FactKind) -> bool {
        match kind {
            FactKind::Type => self.types,
            FactKind::ObjectRelation => self.object_relations,
            FactKind::DataRelation => self.data_relations,
            FactKind::SubClassOf => self.sub_classes,
        }
    }

    /// Supported kinds, in [`FactKind::ALL`] order.
    pub fn kinds(&self) -> Vec<FactKind> {
        FactKind::ALL
            .into_iter()
            .filter(|k| self.supports(*k))
            .collect()
    }
}

/// Per-kind fact sets for the kinds a descriptor supports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FactBuffer {
    slots: BTreeMap<FactKind, FactSet>,
}

impl FactBuffer {
    /// An empty buffer with one sub-buffer per supported kind.
    pub fn new(capabilities: &Capabilities) -> Self {
        Self {
            slots: capabilities
                .kinds()
                .into_iter()
                .map(|k| (k, FactSet::new()))
                .collect(),
        }
    }

    pub fn supports(&self, kind: FactKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Insert a fact. Returns whether the buffer changed.
    ///
    /// Facts of unsupported kinds are refused (`false`); descriptors check
    /// support first and report the error.
    pub fn insert(&mut self, fact: Fact) -> bool {
        match self.slots.get_mut(&fact.kind()) {
            Some(set) => set.insert(fact),
            None => false,
        }
    }

    /// Remove a fact. Returns whether it was present.
    pub fn remove(&mut self, fact: &Fact) -> bool {
        self.slots
            .get_mut(&fact.kind())
            .is_some_and(|set| set.remove(fact))
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.slots
            .get(&fact.kind())
            .is_some_and(|set| set.contains(fact))
    }

    /// Drop every fact in the same slot as `fact`, returning what was dropped.
    pub fn take_slot(&mut self, fact: &Fact) -> FactSet {
        let Some(set) = self.slots.get_mut(&fact.kind()) else {
            return FactSet::new();
        };
        let evicted: FactSet = set.iter().filter(|f| f.same_slot(fact)).cloned().collect();
        for f in &evicted {
            set.remove(f);
        }
        evicted
    }

    /// Facts of one kind. Empty for unsupported kinds.
    pub fn facts(&self, kind: FactKind) -> FactSet {
        self.slots.get(&kind).cloned().unwrap_or_default()
    }

    /// Borrowing view of one kind.
    pub fn iter_kind(&self, kind: FactKind) -> impl Iterator<Item = &Fact> {
        self.slots.get(&kind).into_iter().flatten()
    }

    /// Every buffered fact.
    pub fn all(&self) -> FactSet {
        self.slots.values().flatten().cloned().collect()
    }

    /// Supported kinds, in order.
    pub fn kinds(&self) -> impl Iterator<Item = FactKind> + '_ {
        self.slots.keys().copied()
    }

    /// Number of facts across all kinds.
    pub fn len(&self) -> usize {
        self.slots.values().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.values().all(|s| s.is_empty())
    }
}
