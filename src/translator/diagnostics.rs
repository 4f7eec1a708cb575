/*!
 * Diagnostics reported while translating song markup.
 *
 * A diagnostic never stops translation; any diagnostic at all means the
 * produced fragment must not be cached, persisted or published.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of problem found in the markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// The text contains characters outside the whitelist
    ForbiddenCharacters,
    /// The first line does not open a section
    MissingStartingBlock,
    /// A repetition was opened while another one was open
    NestedRepetition,
    /// A repetition was closed without being opened
    RepetitionEndBeforeStart,
    /// A section ended while a repetition was still open
    RepetitionOverlappingSection,
    /// A chord appeared inside a recitation
    ChordInsideRec,
    /// A bracket token is neither a tag nor a chord
    UnknownTag,
}

impl DiagnosticCode {
    /// Stable identifier of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForbiddenCharacters => "forbidden_characters",
            Self::MissingStartingBlock => "missing_starting_block",
            Self::NestedRepetition => "nested_repetition",
            Self::RepetitionEndBeforeStart => "repetition_end_before_start",
            Self::RepetitionOverlappingSection => "repetition_overlapping_section",
            Self::ChordInsideRec => "chord_inside_rec",
            Self::UnknownTag => "unknown_tag",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single positional diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Zero-based line index, `None` for document-level problems
    pub line_index: Option<usize>,
    pub code: DiagnosticCode,
    pub message: String,
}

impl Diagnostic {
    /// Diagnostic about the document as a whole
    pub fn document(code: DiagnosticCode) -> Self {
        let message = match code {
            DiagnosticCode::ForbiddenCharacters => {
                "Text contains forbidden characters.".to_string()
            }
            DiagnosticCode::MissingStartingBlock => {
                "Song has to start with [verse], [chorus], [intro], [solo] or [rec].".to_string()
            }
            other => format!("Invalid song text ({}).", other),
        };

        Self {
            line_index: None,
            code,
            message,
        }
    }

    /// Diagnostic attached to one line; `token` is the offending markup
    pub fn at_line(line_index: usize, code: DiagnosticCode, token: &str) -> Self {
        let message = match code {
            DiagnosticCode::NestedRepetition => {
                "Repetition started while another repetition is open.".to_string()
            }
            DiagnosticCode::RepetitionEndBeforeStart => {
                "Repetition ended before it was started.".to_string()
            }
            DiagnosticCode::RepetitionOverlappingSection => {
                "Repetition is still open at the end of the section.".to_string()
            }
            DiagnosticCode::ChordInsideRec => {
                format!("Chord {} is not allowed inside [rec].", token)
            }
            DiagnosticCode::UnknownTag => format!("Unknown tag {}.", token),
            DiagnosticCode::ForbiddenCharacters | DiagnosticCode::MissingStartingBlock => {
                return Self {
                    line_index: Some(line_index),
                    ..Self::document(code)
                };
            }
        };

        Self {
            line_index: Some(line_index),
            code,
            message,
        }
    }

    /// Whether this diagnostic concerns the whole document
    pub fn is_document_level(&self) -> bool {
        self.line_index.is_none()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_index {
            Some(index) => write!(f, "Line {}: {}", index + 1, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Join diagnostics into the single message shown to the user
pub fn format_log(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
