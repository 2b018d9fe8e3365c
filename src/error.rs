// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a profiling run.
///
/// Vote ties and taxa seen under two parents have a deterministic resolution
/// and are not errors.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lineage for reference '{ref_id}' has {found} ranks, expected {expected}")]
    LineageLength {
        ref_id: String,
        expected: usize,
        found: usize,
    },

    #[error("malformed taxonomy line {line}: {detail}")]
    MalformedTaxonomy { line: usize, detail: String },

    #[error("malformed FASTA '{}' line {line}: {detail}", .path.display())]
    MalformedFasta {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("malformed hit on line {line}: {detail}")]
    MalformedHit { line: usize, detail: String },

    #[error("window id '{0}' has no '~<index>' fragment suffix")]
    MalformedWindowId(String),

    #[error("sequence '{0}' is not mapped to any genome")]
    UnknownSequence(String),

    #[error("reference '{0}' has no lineage in the taxonomy file")]
    UnknownReference(String),

    #[error("sequence '{seq_id}' appears more than once (genome '{genome_id}')")]
    DuplicateSequence { seq_id: String, genome_id: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{tool} failed: {detail}")]
    ExternalTool { tool: String, detail: String },
}

impl ProfileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProfileError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProfileError>;
