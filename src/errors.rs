/*!
 * Error types for the zpevnik application.
 *
 * This module contains custom error types for the different layers of the
 * publishing pipeline, using the thiserror crate for ergonomic error definitions.
 */

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::translator::diagnostics::{format_log, Diagnostic};

/// A variant whose markup did not translate cleanly
#[derive(Error, Debug, Clone)]
#[error("Song '{title}' contains errors:\n{}", format_log(.diagnostics))]
pub struct RejectedTranslation {
    /// Identifier of the rejected variant
    pub variant_id: String,
    /// Title of the rejected variant
    pub title: String,
    /// Everything the translator reported
    pub diagnostics: Vec<Diagnostic>,
}

/// Step of the external toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainStage {
    /// First typesetting pass, writes the raw index entries
    FirstPass,
    /// Sorting and formatting of the index
    Index,
    /// Second typesetting pass, embeds the finished index
    SecondPass,
}

impl ToolchainStage {
    /// The stages in the order they run
    pub const ORDER: [ToolchainStage; 3] = [Self::FirstPass, Self::Index, Self::SecondPass];
}

impl fmt::Display for ToolchainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstPass | Self::SecondPass => write!(f, "pdf compilation"),
            Self::Index => write!(f, "index generation"),
        }
    }
}

/// Errors that can occur while compiling songs into a document
#[derive(Error, Debug)]
pub enum CompilationError {
    /// One of the songs could not be translated
    #[error("Compilation error: {0}")]
    Rejected(#[from] RejectedTranslation),

    /// A toolchain step exited with a non-zero status
    #[error("Error during {stage}:\n{message}")]
    Toolchain {
        /// Step that failed
        stage: ToolchainStage,
        /// Fatal lines extracted from the step output
        message: String,
    },

    /// The document template could not be rendered
    #[error("Template error: {0}")]
    Template(String),

    /// The toolchain succeeded but the final file is missing
    #[error("Final pdf file does not exist: {0:?}")]
    MissingArtifact(PathBuf),

    /// A songbook entry points at a variant that no longer exists
    #[error("Songbook refers to a missing variant: {0}")]
    MissingVariant(String),

    /// Error from a file operation
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the document store or the work directories
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for CompilationError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", error))
    }
}

/// Errors surfaced by the songbook service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The requested entity does not exist
    #[error("{kind} was not found: {id}")]
    NotFound {
        /// Entity kind, e.g. "Songbook"
        kind: &'static str,
        /// Requested identifier
        id: String,
    },

    /// Submitted markup did not pass translation
    #[error("Validation error:\n{}", format_log(.0))]
    Validation(Vec<Diagnostic>),

    /// Compiling a document failed
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// Error from the document store
    #[error("Store error: {0}")]
    Store(String),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(error: anyhow::Error) -> Self {
        Self::Store(error.to_string())
    }
}
