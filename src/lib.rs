/*!
 * # Zpevnik - songbook markup translator and publisher
 *
 * A Rust library that turns a line-oriented song markup (lyrics, chords,
 * verses, choruses, repetitions) into typesetting source and publishes
 * songbooks through an external typesetting toolchain.
 *
 * ## Features
 *
 * - Markup translation with positional diagnostics
 * - Per-variant fragment cache, cleared on every edit
 * - Three-step document build (typeset, index, typeset)
 * - Per-songbook publish cache with sliding expiration and a sweeper
 * - SQLite song store
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `grammar`: tags, delimiters and output commands of the markup
 * - `translator`: the markup translator:
 *   - `translator::tokens`: line tokenizer
 *   - `translator::core`: translation state machine
 *   - `translator::diagnostics`: diagnostic codes and messages
 * - `cache`: fragment and publish caches
 * - `export`: document template, external toolchain and compilation pipeline
 * - `database`: SQLite persistence of songs, variants and songbooks
 * - `songbook_service`: operations over songs and songbooks
 * - `app_config`: Configuration management
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::too_many_arguments)]

// Public modules
pub mod app_config;
pub mod cache;
pub mod database;
pub mod errors;
pub mod export;
pub mod file_utils;
pub mod grammar;
pub mod songbook_service;
pub mod translator;

// Re-export main types for easier usage
pub use app_config::Config;
pub use cache::{FragmentCache, PublishCache, SweepReport};
pub use errors::{CompilationError, RejectedTranslation, ServiceError};
pub use export::{ArtifactLink, CompilationPipeline};
pub use songbook_service::SongbookService;
pub use translator::{translate, Diagnostic, DiagnosticCode, TranslationResult, Translator};
