/*!
 * Songbook document template.
 *
 * The template is the typesetter's main source file. It pulls in the song
 * fragments file and lays the book out according to the songbook options.
 * Templates are handlebars sources rendered without HTML escaping and in
 * strict mode, so a reference to an unknown value fails the render. Values
 * sitting directly inside typesetter braces use whitespace control
 * (`{ {{~filename~}} }`) to keep clear of the triple-stash syntax.
 */

use anyhow::{Context, Result};
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::path::Path;

use crate::database::models::{IndexPlacement, SongbookOptions};
use crate::errors::CompilationError;
use crate::file_utils::FileManager;
use crate::grammar::escape_plain_text;

static REGISTRY: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.set_strict_mode(true);
    registry
});

/// Template used when no template file is configured
pub const BUILTIN_TEMPLATE: &str = r"\documentclass[{{format}}]{article}
\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage[margin=15mm]{geometry}
\usepackage[{{chorded}}]{songs}

\newindex{titleidx}{ {{~filename~}} }
\noversenumbers
{{#if disable_song_numbering}}
\nosongnumbers
{{/if}}
{{#if disable_page_numbering}}
\pagestyle{empty}
{{/if}}

\begin{document}
{{#if title}}
\begin{center}\Huge {{title}}\end{center}
{{/if}}
{{#if front_index}}
\showindex{Index}{titleidx}
{{/if}}

\songcolumns{ {{~columns~}} }
\begin{songs}{titleidx}
\input{ {{~filename}}.sbd}
\end{songs}

{{#if back_index}}
\showindex{Index}{titleidx}
{{/if}}
\end{document}
";

/// Values substituted into the template
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateContext {
    pub filename: String,
    /// Already escaped for the typesetter
    pub title: String,
    pub format: String,
    pub columns: u8,
    pub chorded: String,
    pub front_index: bool,
    pub back_index: bool,
    pub disable_page_numbering: bool,
    pub disable_song_numbering: bool,
}

impl TemplateContext {
    /// Build the context for a document named `stem` laid out with `options`
    pub fn for_songbook(stem: &str, title: &str, options: &SongbookOptions) -> Self {
        Self {
            filename: stem.to_string(),
            title: escape_plain_text(title),
            format: options.format.class_options().to_string(),
            columns: options.columns,
            chorded: options.chords.package_option().to_string(),
            front_index: options.index == IndexPlacement::Front,
            back_index: options.index == IndexPlacement::Back,
            disable_page_numbering: !options.page_numbering,
            disable_song_numbering: !options.song_numbering,
        }
    }
}

/// Main source file template of a songbook
#[derive(Debug, Clone)]
pub struct SongbookTemplate {
    source: String,
}

impl Default for SongbookTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SongbookTemplate {
    /// The built-in template
    pub fn builtin() -> Self {
        Self {
            source: BUILTIN_TEMPLATE.to_string(),
        }
    }

    /// Use the given template source
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Load a template file, rejecting broken syntax and unknown values early
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = FileManager::read_to_string(&path)?;
        let template = Self::from_source(source);

        template
            .render(&TemplateContext::default())
            .with_context(|| format!("Invalid template file: {:?}", path.as_ref()))?;

        Ok(template)
    }

    /// Template from an optional configured path, falling back to the built-in one
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, context: &TemplateContext) -> Result<String, CompilationError> {
        REGISTRY
            .render_template(&self.source, context)
            .map_err(|e| CompilationError::Template(e.to_string()))
    }
}
