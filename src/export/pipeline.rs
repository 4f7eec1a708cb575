/*!
 * Compilation pipeline.
 *
 * Gathers song fragments into a fragments file, renders the main source
 * file from the songbook options and runs the toolchain in a work
 * directory. The finished document is moved to the ready directory and
 * every work file of the build is removed, whether the build succeeded or not.
 */

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::FragmentCache;
use crate::database::models::{SongbookOptions, SongbookRecord, VariantRecord};
use crate::database::Repository;
use crate::errors::CompilationError;
use crate::export::template::{SongbookTemplate, TemplateContext};
use crate::export::toolchain::{self, Toolchain};
use crate::file_utils::FileManager;
use crate::grammar::escape_plain_text;

/// Extension of the fragments file
const FRAGMENTS_EXTENSION: &str = "sbd";

/// Extension of the main source file
const SOURCE_EXTENSION: &str = "tex";

/// Extension of the finished document
const ARTIFACT_EXTENSION: &str = "pdf";

/// Public link prefix of finished documents
const LINK_PREFIX: &str = "download";

/// A finished document in the ready directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLink {
    /// Random stem shared by every file of the build
    pub stem: String,
    /// Location in the ready directory
    pub path: PathBuf,
    /// Public link, `download/<stem>.pdf`
    pub link: String,
}

impl ArtifactLink {
    fn new(stem: &str, ready_dir: &Path) -> Self {
        let file_name = format!("{}.{}", stem, ARTIFACT_EXTENSION);
        Self {
            stem: stem.to_string(),
            path: ready_dir.join(&file_name),
            link: format!("{}/{}", LINK_PREFIX, file_name),
        }
    }

    /// Rebuild the link of a stored artifact path
    pub fn from_artifact_path(path: &str) -> Option<Self> {
        let path = PathBuf::from(path);
        let stem = path.file_stem()?.to_string_lossy().to_string();
        let file_name = path.file_name()?.to_string_lossy().to_string();

        Some(Self {
            stem,
            link: format!("{}/{}", LINK_PREFIX, file_name),
            path,
        })
    }
}

/// Wrap a fragment as one song of the book; title and interpreters are escaped
pub fn wrap_song(title: &str, interpreters: &[String], fragment: &str) -> String {
    format!(
        "\\beginsong{{{}}}[by={{{}}}] {}\\endsong",
        escape_plain_text(title),
        escape_plain_text(&interpreters.join(", ")),
        fragment
    )
}

/// Builds documents out of songs
#[derive(Clone)]
pub struct CompilationPipeline {
    repository: Repository,
    fragments: FragmentCache,
    toolchain: Arc<dyn Toolchain>,
    template: SongbookTemplate,
    work_dir: PathBuf,
    ready_dir: PathBuf,
}

impl CompilationPipeline {
    pub fn new(
        repository: Repository,
        fragments: FragmentCache,
        toolchain: Arc<dyn Toolchain>,
        template: SongbookTemplate,
        work_dir: impl Into<PathBuf>,
        ready_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository,
            fragments,
            toolchain,
            template,
            work_dir: work_dir.into(),
            ready_dir: ready_dir.into(),
        }
    }

    pub fn fragments(&self) -> &FragmentCache {
        &self.fragments
    }

    pub fn ready_dir(&self) -> &Path {
        &self.ready_dir
    }

    /// Compile every song of a songbook, in entry order
    pub async fn compile_songbook(
        &self,
        songbook: &SongbookRecord,
    ) -> Result<ArtifactLink, CompilationError> {
        let mut songs = Vec::with_capacity(songbook.entries.len());

        for entry in songbook.ordered_entries() {
            let mut variant = self
                .repository
                .find_variant(&entry.variant_id)
                .await?
                .ok_or_else(|| CompilationError::MissingVariant(entry.variant_id.clone()))?;

            songs.push(self.song_source(&mut variant).await?);
        }

        info!(
            "Compiling songbook '{}' with {} songs",
            songbook.title,
            songs.len()
        );
        self.compile_document(&songs, &songbook.title, &songbook.options)
            .await
    }

    /// Compile a single variant as a document of its own
    pub async fn compile_variant(
        &self,
        variant: &mut VariantRecord,
        options: &SongbookOptions,
    ) -> Result<ArtifactLink, CompilationError> {
        let song = self.song_source(variant).await?;

        info!("Compiling variant '{}'", variant.title);
        self.compile_document(&[song], "", options).await
    }

    async fn song_source(&self, variant: &mut VariantRecord) -> Result<String, CompilationError> {
        let fragment = self.fragments.get_or_translate(variant).await?;

        let interpreters = match self.repository.find_song(&variant.song_id).await? {
            Some(song) => song.interpreters,
            None => {
                warn!("Variant {} belongs to a missing song {}", variant.id, variant.song_id);
                Vec::new()
            }
        };

        Ok(wrap_song(&variant.title, &interpreters, &fragment))
    }

    async fn compile_document(
        &self,
        songs: &[String],
        title: &str,
        options: &SongbookOptions,
    ) -> Result<ArtifactLink, CompilationError> {
        let stem = Uuid::new_v4().simple().to_string();
        FileManager::ensure_dir(&self.work_dir)?;
        FileManager::ensure_dir(&self.ready_dir)?;

        let result = self.build(&stem, songs, title, options).await;

        match FileManager::remove_files_with_stem(&self.work_dir, &stem) {
            Ok(removed) => debug!("Removed {} work files of {}", removed, stem),
            Err(e) => warn!("Failed to clean work files of {}: {}", stem, e),
        }

        result
    }

    async fn build(
        &self,
        stem: &str,
        songs: &[String],
        title: &str,
        options: &SongbookOptions,
    ) -> Result<ArtifactLink, CompilationError> {
        let fragments_path = self.work_path(stem, FRAGMENTS_EXTENSION);
        FileManager::write_to_file(&fragments_path, &songs.join("\n"))?;

        let context = TemplateContext::for_songbook(stem, title, options);
        let source = self.template.render(&context)?;
        FileManager::write_to_file(self.work_path(stem, SOURCE_EXTENSION), &source)?;

        toolchain::run_all(self.toolchain.as_ref(), &self.work_dir, stem).await?;

        let produced = self.work_path(stem, ARTIFACT_EXTENSION);
        if !FileManager::file_exists(&produced) {
            return Err(CompilationError::MissingArtifact(produced));
        }

        let link = ArtifactLink::new(stem, &self.ready_dir);
        FileManager::move_file(&produced, &link.path)?;

        if !FileManager::file_exists(&link.path) {
            return Err(CompilationError::MissingArtifact(link.path));
        }

        info!("Document ready: {}", link.link);
        Ok(link)
    }

    fn work_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.work_dir.join(format!("{}.{}", stem, extension))
    }
}
