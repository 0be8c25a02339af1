//! Synchronization intents and reports.
//!
//! Every read or write compares two fact sets and records what has to move:
//! [`SyncIntent`] holds the three-way split (`to_add`, `to_remove`,
//! `unchanged`), [`SyncReport`] collects one intent per fact kind for a
//! single call. Reports are returned to the caller and logged; they are the
//! only record of what a synchronization did.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fact::{FactKind, FactSet};

/// Three-way difference between a source set and a target set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncIntent {
    /// In the source, missing from the target.
    pub to_add: FactSet,
    /// To be removed from the target.
    pub to_remove: FactSet,
    /// Already present on both sides.
    pub unchanged: FactSet,
}

impl SyncIntent {
    /// Additive intent: everything in `source` not yet in `target` is added.
    ///
    /// Nothing is ever scheduled for removal this way; removals only come
    /// from explicit retractions (see [`SyncIntent::with_removals`]).
    pub fn additive(source: &FactSet, target: &FactSet) -> Self {
        Self {
            to_add: source.difference(target).cloned().collect(),
            to_remove: FactSet::new(),
            unchanged: source.intersection(target).cloned().collect(),
        }
    }

    /// Schedule the retracted facts that the target actually holds.
    pub fn with_removals(mut self, retracted: &FactSet, target: &FactSet) -> Self {
        self.to_remove = retracted.intersection(target).cloned().collect();
        self
    }

    /// Whether applying this intent changes nothing.
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

impl std::fmt::Display for SyncIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "+{} -{} ={}",
            self.to_add.len(),
            self.to_remove.len(),
            self.unchanged.len()
        )
    }
}

/// The change set a store applies atomically for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub assert: FactSet,
    pub retract: FactSet,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.assert.is_empty() && self.retract.is_empty()
    }

    /// Merge the per-kind intents of a write into one change set.
    pub fn from_intents<'a>(intents: impl IntoIterator<Item = &'a SyncIntent>) -> Self {
        let mut changes = ChangeSet::default();
        for intent in intents {
            changes.assert.extend(intent.to_add.iter().cloned());
            changes.retract.extend(intent.to_remove.iter().cloned());
        }
        changes
    }
}

/// Direction of a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Store → buffer.
    Read,
    /// Buffer → store.
    Write,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncDirection::Read => write!(f, "read"),
            SyncDirection::Write => write!(f, "write"),
        }
    }
}

/// What one `read_semantic` or `write_semantic` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// IRI of the subject.
    pub subject: String,
    pub direction: SyncDirection,
    /// Seconds since UNIX epoch.
    pub timestamp: u64,
    /// One intent per synchronized kind.
    pub intents: BTreeMap<FactKind, SyncIntent>,
}

impl SyncReport {
    pub fn new(subject: impl Into<String>, direction: SyncDirection) -> Self {
        Self {
            subject: subject.into(),
            direction,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            intents: BTreeMap::new(),
        }
    }

    pub fn with_intent(mut self, kind: FactKind, intent: SyncIntent) -> Self {
        self.intents.insert(kind, intent);
        self
    }

    pub fn intent(&self, kind: FactKind) -> Option<&SyncIntent> {
        self.intents.get(&kind)
    }

    pub fn is_noop(&self) -> bool {
        self.intents.values().all(SyncIntent::is_noop)
    }

    pub fn added(&self) -> usize {
        self.intents.values().map(|i| i.to_add.len()).sum()
    }

    pub fn removed(&self) -> usize {
        self.intents.values().map(|i| i.to_remove.len()).sum()
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}:", self.direction, self.subject)?;
        for (kind, intent) in &self.intents {
            write!(f, " {kind}[{intent}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Fact;

    fn set(facts: &[Fact]) -> FactSet {
        facts.iter().cloned().collect()
    }

    #[test]
    fn additive_intent_splits_sets() {
        let local = set(&[Fact::of_type("Robot"), Fact::of_type("Agent")]);
        let remote = set(&[Fact::of_type("Agent"), Fact::of_type("Thing")]);
        let intent = SyncIntent::additive(&local, &remote);
        assert_eq!(intent.to_add, set(&[Fact::of_type("Robot")]));
        assert_eq!(intent.unchanged, set(&[Fact::of_type("Agent")]));
        assert!(intent.to_remove.is_empty());
    }

    #[test]
    fn removals_only_for_held_facts() {
        let remote = set(&[Fact::object("isIn", "Room1")]);
        let retracted = set(&[Fact::object("isIn", "Room1"), Fact::object("isIn", "Room9")]);
        let intent = SyncIntent::additive(&FactSet::new(), &remote).with_removals(&retracted, &remote);
        assert_eq!(intent.to_remove, set(&[Fact::object("isIn", "Room1")]));
        assert!(!intent.is_noop());
    }

    #[test]
    fn empty_sets_are_noop() {
        assert!(SyncIntent::additive(&FactSet::new(), &FactSet::new()).is_noop());
        let report = SyncReport::new("urn:x", SyncDirection::Read)
            .with_intent(FactKind::Type, SyncIntent::default());
        assert!(report.is_noop());
    }

    #[test]
    fn change_set_merges_intents() {
        let a = SyncIntent {
            to_add: set(&[Fact::of_type("Robot")]),
            ..Default::default()
        };
        let b = SyncIntent {
            to_remove: set(&[Fact::object("isIn", "Room1")]),
            ..Default::default()
        };
        let changes = ChangeSet::from_intents([&a, &b]);
        assert_eq!(changes.assert.len(), 1);
        assert_eq!(changes.retract.len(), 1);
        assert!(!changes.is_empty());
    }

    #[test]
    fn report_counts_and_display() {
        let report = SyncReport::new("Robot1", SyncDirection::Write).with_intent(
            FactKind::Type,
            SyncIntent {
                to_add: set(&[Fact::of_type("Robot")]),
                ..Default::default()
            },
        );
        assert_eq!(report.added(), 1);
        assert_eq!(report.removed(), 0);
        assert_eq!(report.to_string(), "write Robot1: type[+1 -0 =0]");
    }
}
