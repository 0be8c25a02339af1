//! Export types for serializing descriptor state.
//!
//! These types give a flat, name-resolved view of a descriptor's buffer and
//! of sync reports, suitable for JSON export.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fact::{Fact, FactKind, FactSet};
use crate::subject::{EntityRole, Subject};
use crate::sync::SyncReport;

/// Exported descriptor buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorExport {
    /// Short name of the subject.
    pub subject: String,
    /// Full IRI of the subject.
    pub iri: String,
    pub role: EntityRole,
    /// Buffered facts per supported kind.
    pub facts: BTreeMap<FactKind, Vec<Fact>>,
    /// Facts scheduled for removal at the next write.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_retractions: Vec<Fact>,
}

impl DescriptorExport {
    pub(crate) fn from_parts(
        subject: &Subject,
        role: EntityRole,
        facts: impl IntoIterator<Item = (FactKind, FactSet)>,
        retractions: &FactSet,
    ) -> Self {
        Self {
            subject: subject.name().to_string(),
            iri: subject.iri().to_string(),
            role,
            facts: facts
                .into_iter()
                .map(|(kind, set)| (kind, set.into_iter().collect()))
                .collect(),
            pending_retractions: retractions.iter().cloned().collect(),
        }
    }

    /// Number of buffered facts.
    pub fn fact_count(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Exported sync report with counts instead of full fact sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportExport {
    pub subject: String,
    pub direction: String,
    /// Seconds since UNIX epoch.
    pub timestamp: u64,
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl From<&SyncReport> for ReportExport {
    fn from(report: &SyncReport) -> Self {
        Self {
            subject: report.subject.clone(),
            direction: report.direction.to_string(),
            timestamp: report.timestamp,
            added: report.added(),
            removed: report.removed(),
            unchanged: report.intents.values().map(|i| i.unchanged.len()).sum(),
        }
    }
}
