//! Error types for GEDCOM conversion.
//!
//! Errors here are scoped: an [`GedcomError::UnresolvedReference`] or
//! [`GedcomError::Print`] abandons a single page, never the whole file.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GedcomError {
    /// A citation points at an id that no record in the file defines.
    #[error("unresolved reference to {target} from {owner}")]
    UnresolvedReference { owner: String, target: String },

    /// A structural precondition failed while printing a page.
    #[error("cannot print {container}: {reason}")]
    Print { container: String, reason: String },

    /// The schema file could not be read or has a malformed row.
    #[error("schema file {path}: {message}")]
    Schema { path: PathBuf, message: String },

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GedcomError {
    /// Errors that only cost the owning page its output.
    pub fn is_per_object(&self) -> bool {
        matches!(
            self,
            GedcomError::UnresolvedReference { .. } | GedcomError::Print { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GedcomError>;
