//! Library error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::analysis::ClassName;

/// Errors surfaced by the analysis library.
#[derive(Error, Debug)]
pub enum MutcheckError {
    #[error("class not found: {0}")]
    ClassNotFound(ClassName),

    #[error("malformed class {class}: {message}")]
    MalformedClass { class: ClassName, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Analysis stopped under the fail-fast policy.
    #[error("analysis of {class} aborted in {checker}: {description}")]
    Aborted {
        class: ClassName,
        checker: String,
        description: String,
        /// Classes that had completed before the abort.
        analysed: Vec<ClassName>,
    },
}

impl MutcheckError {
    pub fn is_abort(&self) -> bool {
        matches!(self, MutcheckError::Aborted { .. })
    }
}
