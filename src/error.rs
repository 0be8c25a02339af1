//! Rich diagnostic error types for ontoloop.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and whether retrying makes sense.

use miette::Diagnostic;
use thiserror::Error;

use crate::fact::FactKind;

/// Top-level error type for ontoloop.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum OntoError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Synchronization errors
// ---------------------------------------------------------------------------

/// Failures surfaced by descriptor operations.
#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("fact store unavailable while synchronizing \"{subject}\": {message}")]
    #[diagnostic(
        code(ontoloop::sync::store_unavailable),
        help(
            "The store could not be reached or failed internally. The local buffer \
             was left untouched, so the same call can be retried once the store \
             is back."
        )
    )]
    StoreUnavailable { subject: String, message: String },

    #[error("subject \"{subject}\" is not known to the fact store")]
    #[diagnostic(
        code(ontoloop::sync::subject_not_found),
        help(
            "The descriptor runs in strict mode. Write the subject first, or use \
             `MissingSubject::Empty` to treat unknown subjects as having no facts."
        )
    )]
    SubjectNotFound { subject: String },

    #[error("write rejected for \"{subject}\": {reason}")]
    #[diagnostic(
        code(ontoloop::sync::write_rejected),
        help(
            "The store refused the change set because it violates a consistency \
             rule. Nothing was written and the buffer is unchanged; inspect it, \
             retract the offending fact, and write again."
        )
    )]
    WriteRejected { subject: String, reason: String },

    #[error("fact kind {kind} is not supported by the descriptor of \"{subject}\"")]
    #[diagnostic(
        code(ontoloop::sync::unsupported_kind),
        help(
            "Descriptors only hold the fact kinds selected by their capabilities. \
             Build the descriptor with `Capabilities` that include this kind."
        )
    )]
    UnsupportedFactKind { subject: String, kind: FactKind },
}

impl SyncError {
    /// Map a store-side failure onto the synchronization taxonomy.
    ///
    /// Consistency violations become [`SyncError::WriteRejected`], everything
    /// else is treated as the store being unavailable.
    pub fn from_store(subject: &str, err: StoreError) -> Self {
        match err {
            StoreError::Inconsistent { violations } => SyncError::WriteRejected {
                subject: subject.to_string(),
                reason: violations.join("; "),
            },
            other => SyncError::StoreUnavailable {
                subject: subject.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Whether the same call may succeed if retried unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::StoreUnavailable { .. })
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(ontoloop::store::io),
        help(
            "A filesystem operation failed. Check that the ontology directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(ontoloop::store::redb),
        help(
            "The snapshot database encountered a transaction error. \
             The file may be locked by another process or corrupted."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(ontoloop::store::serde),
        help(
            "Failed to serialize or deserialize facts. The snapshot was probably \
             written by an incompatible version."
        )
    )]
    Serialization { message: String },

    #[error("SPARQL error: {message}")]
    #[diagnostic(
        code(ontoloop::store::sparql),
        help("The RDF store rejected a query or update. Check that names are valid IRIs.")
    )]
    Sparql { message: String },

    #[error("store \"{store}\" is unavailable: {message}")]
    #[diagnostic(
        code(ontoloop::store::unavailable),
        help("The backing resource could not be reached. Retry later.")
    )]
    Unavailable { store: String, message: String },

    #[error("inconsistent change set: {}", .violations.join("; "))]
    #[diagnostic(
        code(ontoloop::store::inconsistent),
        help(
            "Applying these facts would make the ontology inconsistent \
             (functional property with two values, or disjoint classes shared)."
        )
    )]
    Inconsistent { violations: Vec<String> },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(ontoloop::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(ontoloop::config::parse),
        help("Check the TOML syntax and field names in the store config.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(ontoloop::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ontology IRI \"{iri}\"")]
    #[diagnostic(
        code(ontoloop::config::invalid_iri),
        help("The ontology IRI must be absolute, e.g. `http://example.org/onto`.")
    )]
    InvalidIri { iri: String },
}

/// Convenience alias for functions returning ontoloop results.
pub type OntoResult<T> = std::result::Result<T, OntoError>;

/// Result type for descriptor operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
