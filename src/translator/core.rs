/*!
 * Markup to typesetting translation.
 *
 * The translator runs two document-wide checks, then walks the lines in
 * order, feeding every token to a small state machine that tracks the open
 * block and the open repetition. All problems are collected as diagnostics;
 * the translator itself never fails.
 */

use log::debug;
use serde::{Deserialize, Serialize};

use crate::grammar::{self, commands, SectionKind, REPETITION_END, REPETITION_START};

use super::diagnostics::{format_log, Diagnostic, DiagnosticCode};
use super::tokens::{Piece, Tag, Tokenizer};

/// Anything able to turn markup into a typeset fragment
pub trait MarkupTranslator: Send + Sync {
    fn translate(&self, text: &str) -> TranslationResult;
}

/// Translator behaviour switches
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslatorConfig {
    /// Unknown bracket tokens are removed from the output instead of passed through
    #[serde(default = "default_true")]
    pub drop_unknown_tags: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            drop_unknown_tags: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Fragment produced from a markup document together with its diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub fragment: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslationResult {
    /// Whether the fragment may be used
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// All diagnostics as one user-facing message
    pub fn log(&self) -> String {
        format_log(&self.diagnostics)
    }

    /// Number of diagnostics with the given code
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }

    /// The fragment if the translation is clean, the diagnostics otherwise
    pub fn into_fragment(self) -> Result<String, Vec<Diagnostic>> {
        if self.diagnostics.is_empty() {
            Ok(self.fragment)
        } else {
            Err(self.diagnostics)
        }
    }
}

/// Block that is currently open; at most one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Recitation,
    Verse,
    Chorus,
}

/// Per-document translation state
#[derive(Debug, Default)]
struct TranslationState {
    block: Option<OpenBlock>,
    repetition: bool,
}

impl TranslationState {
    /// Close the open block and return the command that ends it
    fn close(&mut self, line_index: usize, diagnostics: &mut Vec<Diagnostic>) -> &'static str {
        if self.repetition {
            // The repetition stays open
            diagnostics.push(Diagnostic::at_line(
                line_index,
                DiagnosticCode::RepetitionOverlappingSection,
                REPETITION_START,
            ));
        }

        match self.block.take() {
            Some(OpenBlock::Recitation) => commands::END_RECITATION,
            Some(OpenBlock::Verse) => commands::END_VERSE,
            Some(OpenBlock::Chorus) => commands::END_CHORUS,
            None => "",
        }
    }
}

/// The markup translator
#[derive(Debug, Clone, Default)]
pub struct Translator {
    config: TranslatorConfig,
}

impl Translator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    fn translate_line(
        &self,
        line: &str,
        line_index: usize,
        state: &mut TranslationState,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> String {
        let mut output = String::with_capacity(line.len() + 16);

        for piece in Tokenizer::new(line) {
            match piece {
                Piece::Text(text) => output.push_str(text),
                Piece::Tag(tag) => self.dispatch(tag, line_index, state, diagnostics, &mut output),
            }
        }

        escape(&output)
    }

    fn dispatch(
        &self,
        tag: Tag<'_>,
        line_index: usize,
        state: &mut TranslationState,
        diagnostics: &mut Vec<Diagnostic>,
        output: &mut String,
    ) {
        match tag {
            Tag::Section(kind) => {
                output.push_str(state.close(line_index, diagnostics));
                output.push_str(kind.open_command());
                state.block = Some(match kind {
                    SectionKind::Chorus => OpenBlock::Chorus,
                    _ => OpenBlock::Verse,
                });
            }
            Tag::Recitation => {
                output.push_str(state.close(line_index, diagnostics));
                output.push_str(commands::BEGIN_RECITATION);
                state.block = Some(OpenBlock::Recitation);
            }
            Tag::RepStart => {
                if state.repetition {
                    diagnostics.push(Diagnostic::at_line(
                        line_index,
                        DiagnosticCode::NestedRepetition,
                        REPETITION_START,
                    ));
                }
                output.push_str(commands::BEGIN_REPETITION);
                state.repetition = true;
            }
            Tag::RepEnd(count) => {
                if !state.repetition {
                    diagnostics.push(Diagnostic::at_line(
                        line_index,
                        DiagnosticCode::RepetitionEndBeforeStart,
                        REPETITION_END,
                    ));
                }
                output.push_str(&commands::end_repetition(count));
                state.repetition = false;
            }
            Tag::Chord(token) => {
                if state.block == Some(OpenBlock::Recitation) {
                    diagnostics.push(Diagnostic::at_line(
                        line_index,
                        DiagnosticCode::ChordInsideRec,
                        token,
                    ));
                }
                output.push_str(token);
            }
            Tag::Unknown(token) => {
                diagnostics.push(Diagnostic::at_line(line_index, DiagnosticCode::UnknownTag, token));
                if !self.config.drop_unknown_tags {
                    output.push_str(token);
                }
            }
        }
    }
}

impl MarkupTranslator for Translator {
    fn translate(&self, text: &str) -> TranslationResult {
        let mut diagnostics = Vec::new();

        if grammar::contains_forbidden_characters(text) {
            diagnostics.push(Diagnostic::document(DiagnosticCode::ForbiddenCharacters));
        }

        let first_line = text.trim().lines().next().unwrap_or("");
        if !grammar::starts_with_leading_tag(first_line) {
            diagnostics.push(Diagnostic::document(DiagnosticCode::MissingStartingBlock));
        }

        let mut state = TranslationState::default();
        let lines: Vec<String> = text
            .split('\n')
            .enumerate()
            .map(|(index, line)| self.translate_line(line.trim(), index, &mut state, &mut diagnostics))
            .collect();

        let last_index = lines.len().saturating_sub(1);
        let mut fragment = lines.join("\n");
        fragment.push_str(state.close(last_index, &mut diagnostics));

        debug!(
            "Translated {} lines of markup with {} diagnostics",
            lines.len(),
            diagnostics.len()
        );

        TranslationResult {
            fragment,
            diagnostics,
        }
    }
}

/// Translate with the default configuration
pub fn translate(text: &str) -> TranslationResult {
    Translator::default().translate(text)
}

/// Escape characters with a meaning to the typesetter.
///
/// Runs after tag substitution so that retained chord brackets are escaped too.
fn escape(line: &str) -> String {
    line.replace('[', "\\[")
        .replace('"', "''")
        .replace('%', "\\%")
}
