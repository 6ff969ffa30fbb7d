//! Error taxonomy for import runs.
//!
//! Every component surfaces failures as [`ImportError`]. The enum carries a
//! machine-readable [`ErrorCategory`] so the processor can decide between
//! aborting a run, skipping a record, or suppressing the error entirely based
//! on the active skip flags, without matching on concrete variants.
//!
//! Categories:
//! - **Configuration** — required bindings missing before a run starts; always
//!   fatal, raised before the processor reaches the running state.
//! - **Structural** — reader I/O, parse, transform, store, or bulk-import
//!   failures; always fatal to the run and trigger rollback.
//! - **DataQuality** — validation failures; gated by `skip-invalid-records`.
//! - **InvalidSample / InvalidDataSource / InvalidGene** — named-entity
//!   failures; each gated by its own skip flag.
//! - **Rollback** — failure while undoing a failed run; wraps but never masks
//!   the original failure.

use thiserror::Error;

use crate::validation::{format_errors, ValidationError};

/// Machine-readable classification of an [`ImportError`].
///
/// The processor inspects the category (never the concrete variant) when
/// applying skip-flag policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or inconsistent run bindings; fatal before the run starts.
    Configuration,
    /// I/O, parse, transform, store, or bulk-import failure; always fatal.
    Structural,
    /// A record failed validation; gated by `skip-invalid-records`.
    DataQuality,
    /// A sample was unusable; gated by `skip-invalid-samples`.
    InvalidSample,
    /// The data source was unusable; gated by `skip-invalid-data-source`.
    InvalidDataSource,
    /// A gene reference was unusable; gated by `skip-invalid-genes`.
    InvalidGene,
    /// Failure while rolling back a failed run.
    Rollback,
}

/// The single error type surfaced by every pipeline component and by
/// [`Processor::run`](crate::processor::Processor::run).
#[derive(Debug, Error)]
pub enum ImportError {
    /// Required metadata or bindings were missing before the run started.
    #[error("import not configured: {0}")]
    Configuration(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text parse or serialization failure.
    #[error("delimited record error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parse or serialization failure.
    #[error("JSON record error: {0}")]
    Json(#[from] serde_json::Error),

    /// Source file could not be opened or its header was malformed.
    #[error("unreadable source {path}: {message}")]
    UnreadableSource { path: String, message: String },

    /// A row could not be parsed into the target record type.
    #[error("malformed record at line {line} of {path}: {message}")]
    MalformedRecord {
        path: String,
        line: u64,
        message: String,
    },

    /// A transformer rejected a record; structural, never skippable.
    #[error("transform failed for record {record}: {message}")]
    Transform { record: String, message: String },

    /// The target store rejected an operation.
    #[error("store operation failed: {0}")]
    Store(String),

    /// Insert of a record whose id already exists.
    #[error("duplicate key on insert: {0}")]
    DuplicateKey(String),

    /// Update of a record with no id or no existing counterpart.
    #[error("no existing record to update: {0}")]
    MissingRecord(String),

    /// A record failed validation.
    #[error("record {record} failed validation: {}", format_errors(errors))]
    InvalidRecord {
        record: String,
        errors: Vec<ValidationError>,
    },

    /// A sample encountered during the run was unusable.
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    /// The data source for the run was unusable.
    #[error("invalid data source: {0}")]
    InvalidDataSource(String),

    /// A gene reference encountered during the run was unusable.
    #[error("invalid gene: {0}")]
    InvalidGene(String),

    /// Bulk load of a staged file failed; some records may have loaded.
    #[error("bulk import of {path} failed: {message}")]
    BulkImport { path: String, message: String },

    /// Rollback of a failed run itself failed. Carries the original failure's
    /// message so it is never masked.
    #[error(
        "rollback of data source {data_source_id} failed: {message} (original failure: {original})"
    )]
    Rollback {
        data_source_id: String,
        message: String,
        original: String,
    },
}

impl ImportError {
    /// The policy-relevant category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::Configuration(_) => ErrorCategory::Configuration,
            ImportError::Io(_)
            | ImportError::Csv(_)
            | ImportError::Json(_)
            | ImportError::UnreadableSource { .. }
            | ImportError::MalformedRecord { .. }
            | ImportError::Transform { .. }
            | ImportError::Store(_)
            | ImportError::DuplicateKey(_)
            | ImportError::MissingRecord(_)
            | ImportError::BulkImport { .. } => ErrorCategory::Structural,
            ImportError::InvalidRecord { .. } => ErrorCategory::DataQuality,
            ImportError::InvalidSample(_) => ErrorCategory::InvalidSample,
            ImportError::InvalidDataSource(_) => ErrorCategory::InvalidDataSource,
            ImportError::InvalidGene(_) => ErrorCategory::InvalidGene,
            ImportError::Rollback { .. } => ErrorCategory::Rollback,
        }
    }

    /// Shorthand for an unreadable-source error with path context.
    pub fn unreadable(path: impl Into<String>, message: impl ToString) -> Self {
        ImportError::UnreadableSource {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
