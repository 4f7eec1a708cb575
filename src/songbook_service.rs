/*!
 * Songbook service.
 *
 * Orchestrates the store, the translator and both caches. Every edit loads
 * the record, applies the change through the record's own mutators (which
 * clear the affected cache) and persists the result in one write.
 */

use anyhow::Result;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::app_config::Config;
use crate::cache::{FragmentCache, PublishCache, SweepReport};
use crate::database::models::{
    SongRecord, SongbookOptions, SongbookRecord, SongbookUpdate, VariantRecord, VariantUpdate,
    Visibility,
};
use crate::database::Repository;
use crate::errors::ServiceError;
use crate::export::{ArtifactLink, CompilationPipeline, ProcessToolchain, SongbookTemplate, Toolchain};
use crate::translator::{MarkupTranslator, Translator};

/// Data of a variant to be created
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub title: String,
    pub text: String,
    pub description: String,
    pub visibility: Visibility,
}

/// Entry point for song and songbook operations
#[derive(Clone)]
pub struct SongbookService {
    repository: Repository,
    fragments: FragmentCache,
    publish: PublishCache,
}

impl SongbookService {
    /// Wire the service from its collaborators
    pub fn new(
        repository: Repository,
        translator: Arc<dyn MarkupTranslator>,
        toolchain: Arc<dyn Toolchain>,
        template: SongbookTemplate,
        config: &Config,
    ) -> Self {
        let fragments = FragmentCache::new(repository.clone(), translator);
        let pipeline = CompilationPipeline::new(
            repository.clone(),
            fragments.clone(),
            toolchain,
            template,
            &config.storage.work_dir,
            &config.storage.ready_dir,
        );
        let publish = PublishCache::new(
            repository.clone(),
            pipeline,
            config.cache_ttl(),
            Duration::from_secs(config.cache.orphan_grace_secs),
        );

        Self {
            repository,
            fragments,
            publish,
        }
    }

    /// Wire the service with the configured translator, toolchain and template
    pub fn from_config(config: &Config, repository: Repository) -> Result<Self> {
        let translator = Arc::new(Translator::new(config.translator.clone()));
        let toolchain = Arc::new(ProcessToolchain::new(config.toolchain.clone()));
        let template = SongbookTemplate::load(config.storage.template_path.as_deref())?;

        Ok(Self::new(repository, translator, toolchain, template, config))
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn fragments(&self) -> &FragmentCache {
        &self.fragments
    }

    pub fn publish_cache(&self) -> &PublishCache {
        &self.publish
    }

    // =========================================================================
    // Songs and variants
    // =========================================================================

    pub async fn create_song(
        &self,
        title: &str,
        interpreters: Vec<String>,
    ) -> Result<SongRecord, ServiceError> {
        let song = SongRecord::new(Uuid::new_v4().to_string(), title.to_string(), interpreters);
        self.repository.create_song(&song).await?;

        info!("Created song '{}' ({})", song.title, song.id);
        Ok(song)
    }

    /// Create a variant; markup with diagnostics is refused and nothing is stored
    pub async fn create_variant(
        &self,
        song_id: &str,
        owner: &str,
        data: NewVariant,
    ) -> Result<VariantRecord, ServiceError> {
        if self.repository.find_song(song_id).await?.is_none() {
            return Err(ServiceError::not_found("Song", song_id));
        }
        self.validate_markup(&data.text)?;

        let variant = VariantRecord::new(
            Uuid::new_v4().to_string(),
            song_id.to_string(),
            owner.to_string(),
            data.title,
            data.text,
            data.description,
            data.visibility,
        );
        self.repository.create_variant(&variant).await?;

        info!("Created variant '{}' ({})", variant.title, variant.id);
        Ok(variant)
    }

    pub async fn find_variant(&self, variant_id: &str) -> Result<VariantRecord, ServiceError> {
        self.repository
            .find_variant(variant_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Variant", variant_id))
    }

    /// Edit a variant; new markup is validated before anything changes
    pub async fn edit_variant(
        &self,
        variant_id: &str,
        update: VariantUpdate,
    ) -> Result<VariantRecord, ServiceError> {
        let mut variant = self.find_variant(variant_id).await?;

        if let Some(text) = &update.text {
            self.validate_markup(text)?;
        }

        if variant.apply_update(update) {
            self.repository.save_variant(&variant).await?;
            debug!("Edited variant {}, fragment cache cleared", variant.id);
        }

        Ok(variant)
    }

    /// Delete a variant and drop it from every songbook placing it
    ///
    /// Both happen in one store transaction, so no songbook is ever left
    /// pointing at a deleted variant.
    pub async fn delete_variant(&self, variant_id: &str) -> Result<(), ServiceError> {
        let touched = self
            .repository
            .delete_variant(variant_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Variant", variant_id))?;

        info!("Deleted variant {} (removed from {} songbook(s))", variant_id, touched);
        Ok(())
    }

    // =========================================================================
    // Songbooks
    // =========================================================================

    pub async fn create_songbook(
        &self,
        title: &str,
        owner: &str,
        options: SongbookOptions,
    ) -> Result<SongbookRecord, ServiceError> {
        let songbook = SongbookRecord::new(
            Uuid::new_v4().to_string(),
            title.to_string(),
            owner.to_string(),
            options,
        );
        self.repository.create_songbook(&songbook).await?;

        info!("Created songbook '{}' ({})", songbook.title, songbook.id);
        Ok(songbook)
    }

    pub async fn find_songbook(&self, songbook_id: &str) -> Result<SongbookRecord, ServiceError> {
        self.repository
            .find_songbook(songbook_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Songbook", songbook_id))
    }

    pub async fn edit_songbook(
        &self,
        songbook_id: &str,
        update: SongbookUpdate,
    ) -> Result<SongbookRecord, ServiceError> {
        let mut songbook = self.find_songbook(songbook_id).await?;

        if songbook.apply_update(update) {
            self.repository.save_songbook(&songbook).await?;
            debug!("Edited songbook {}, publish cache cleared", songbook.id);
        }

        Ok(songbook)
    }

    /// Place a variant in a songbook, replacing another variant of the same song
    pub async fn set_songbook_entry(
        &self,
        songbook_id: &str,
        song_id: &str,
        variant_id: &str,
        order: i64,
    ) -> Result<SongbookRecord, ServiceError> {
        let mut songbook = self.find_songbook(songbook_id).await?;

        let variant = self.find_variant(variant_id).await?;
        if variant.song_id != song_id {
            return Err(ServiceError::not_found("Variant of song", variant_id));
        }

        songbook.set_entry(song_id, variant_id, order);
        self.repository.save_songbook(&songbook).await?;

        Ok(songbook)
    }

    pub async fn remove_songbook_entry(
        &self,
        songbook_id: &str,
        variant_id: &str,
    ) -> Result<SongbookRecord, ServiceError> {
        let mut songbook = self.find_songbook(songbook_id).await?;

        if !songbook.remove_entry(variant_id) {
            return Err(ServiceError::not_found("Songbook entry", variant_id));
        }
        self.repository.save_songbook(&songbook).await?;

        Ok(songbook)
    }

    pub async fn delete_songbook(&self, songbook_id: &str) -> Result<(), ServiceError> {
        if !self.repository.delete_songbook(songbook_id).await? {
            return Err(ServiceError::not_found("Songbook", songbook_id));
        }

        info!("Deleted songbook {}", songbook_id);
        Ok(())
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Published document of a songbook, reusing the cached one when possible
    pub async fn publish_songbook(&self, songbook_id: &str) -> Result<ArtifactLink, ServiceError> {
        let mut songbook = self.find_songbook(songbook_id).await?;
        Ok(self.publish.get_or_compile(&mut songbook).await?)
    }

    /// Compile one variant on its own; the result is not cached
    pub async fn export_variant(
        &self,
        variant_id: &str,
        options: &SongbookOptions,
    ) -> Result<ArtifactLink, ServiceError> {
        let mut variant = self.find_variant(variant_id).await?;
        Ok(self
            .publish
            .pipeline()
            .compile_variant(&mut variant, options)
            .await?)
    }

    pub async fn sweep(&self) -> Result<SweepReport, ServiceError> {
        Ok(self.publish.sweep().await?)
    }

    pub fn spawn_periodic_sweep(&self, interval: Duration) -> JoinHandle<()> {
        self.publish.spawn_periodic_sweep(interval)
    }

    fn validate_markup(&self, text: &str) -> Result<(), ServiceError> {
        let result = self.fragments.translator().translate(text);
        if result.is_clean() {
            Ok(())
        } else {
            Err(ServiceError::Validation(result.diagnostics))
        }
    }
}
