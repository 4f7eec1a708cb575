/*!
 * Song markup translator.
 *
 * Turns the line-oriented tag language used for lyrics and chords into a
 * fragment ready for the typesetter:
 *
 * - `tokens`: splits a line into text and tag tokens
 * - `diagnostics`: positional problems found while translating
 * - `core`: the translator state machine
 */

pub mod core;
pub mod diagnostics;
pub mod tokens;

pub use self::core::{translate, MarkupTranslator, TranslationResult, Translator, TranslatorConfig};
pub use self::diagnostics::{Diagnostic, DiagnosticCode};
