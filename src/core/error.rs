use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during reference import or batch processing.
///
/// Per-document and per-archive faults are isolated by the orchestrator and
/// never abort a batch; only faults affecting the run's ability to produce
/// any output surface as a run failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReggisError {
    /// Reference-data file header mismatch. Fatal to that import call only.
    #[error("reference file format invalid: {0}")]
    FormatInvalid(String),

    /// One invoice document failed to parse. Skipped, batch continues.
    #[error("malformed document {origin}: {message}")]
    MalformedDocument { origin: String, message: String },

    /// One archive or input file failed to open. Skipped, batch continues.
    #[error("archive unreadable {origin}: {message}")]
    ArchiveUnreadable { origin: String, message: String },

    /// The output destination cannot be written. Aborts the run.
    #[error("output unwritable at {path}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run produced no accepted lines at all, whether nothing was
    /// extracted or validation rejected everything.
    #[error("no lines accepted from {units} input file(s)")]
    EmptyRun { units: usize },

    /// Reference store snapshot could not be read or written.
    #[error("reference store I/O at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reference store snapshot exists but does not deserialize.
    #[error("reference store snapshot corrupt at {path}: {message}")]
    StoreCorrupt { path: PathBuf, message: String },

    /// Filesystem fault outside the per-file isolation paths (e.g. the
    /// input folder itself cannot be enumerated).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why the validation filter rejected a line.
///
/// A rejection is a policy outcome, not an error: rejected lines are tallied
/// and reported but never abort the batch and are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The (code, legal entity) pair is not in the materials table.
    UnknownMaterial { code: String, entity: String },
    /// The buyer tax ID is not in the clients table.
    UnknownClient { tax_id: String },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnknownMaterial { code, entity } => {
                write!(f, "unknown material {code} (entity {entity})")
            }
            RejectReason::UnknownClient { tax_id } => {
                write!(f, "unknown client {tax_id}")
            }
        }
    }
}
