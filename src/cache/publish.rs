/*!
 * Songbook-level publish cache.
 *
 * A songbook points at its last published document together with an
 * expiration that slides forward on every reuse. A background sweep drops
 * expired pointers and deletes documents nothing points at any more.
 */

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

use crate::database::models::SongbookRecord;
use crate::database::Repository;
use crate::errors::CompilationError;
use crate::export::{ArtifactLink, CompilationPipeline};
use crate::file_utils::FileManager;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Songbooks whose expired pointer was cleared
    pub expired_entries: usize,
    /// Unreferenced documents deleted from the ready directory
    pub removed_files: usize,
    /// Unreferenced documents kept because they are still young
    pub kept_orphans: usize,
}

/// Publish cache over the compilation pipeline
#[derive(Clone)]
pub struct PublishCache {
    repository: Repository,
    pipeline: CompilationPipeline,
    ttl: chrono::Duration,
    orphan_grace: Duration,
}

impl PublishCache {
    pub fn new(
        repository: Repository,
        pipeline: CompilationPipeline,
        ttl: chrono::Duration,
        orphan_grace: Duration,
    ) -> Self {
        Self {
            repository,
            pipeline,
            ttl,
            orphan_grace,
        }
    }

    pub fn pipeline(&self) -> &CompilationPipeline {
        &self.pipeline
    }

    /// Published document of the songbook, compiling it when needed
    pub async fn get_or_compile(
        &self,
        songbook: &mut SongbookRecord,
    ) -> Result<ArtifactLink, CompilationError> {
        self.get_or_compile_at(songbook, Utc::now()).await
    }

    /// Same as [`get_or_compile`](Self::get_or_compile) with an explicit clock
    ///
    /// The pointer is written only while the stored songbook still has the
    /// revision `songbook` was read at; a document built from content edited
    /// in the meantime is returned to this caller but never cached.
    pub async fn get_or_compile_at(
        &self,
        songbook: &mut SongbookRecord,
        now: DateTime<Utc>,
    ) -> Result<ArtifactLink, CompilationError> {
        let expires_at = now + self.ttl;

        if let Some(link) = self.live_link(songbook, now) {
            debug!("Publish cache hit for songbook {}", songbook.id);
            self.store_pointer(songbook, &link, expires_at).await?;
            return Ok(link);
        }

        debug!("Publish cache miss for songbook {}", songbook.id);
        let link = self.pipeline.compile_songbook(songbook).await?;
        self.store_pointer(songbook, &link, expires_at).await?;

        Ok(link)
    }

    async fn store_pointer(
        &self,
        songbook: &mut SongbookRecord,
        link: &ArtifactLink,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CompilationError> {
        let path = link.path.to_string_lossy().to_string();
        let stored = self
            .repository
            .store_publish_pointer(&songbook.id, songbook.revision, &path, expires_at)
            .await?;

        if stored {
            songbook.artifact_path = Some(path);
            songbook.cache_expires_at = Some(expires_at);
        } else {
            debug!(
                "Songbook {} changed since revision {}, {} not cached",
                songbook.id, songbook.revision, link.link
            );
        }
        Ok(())
    }

    /// Link of the cached document if the pointer is live and the file exists
    fn live_link(&self, songbook: &SongbookRecord, now: DateTime<Utc>) -> Option<ArtifactLink> {
        let path = songbook.artifact_path.as_deref()?;

        if songbook.is_cache_expired(now) {
            return None;
        }

        if !FileManager::file_exists(path) {
            warn!(
                "Published document of songbook {} is gone: {}",
                songbook.id, path
            );
            return None;
        }

        ArtifactLink::from_artifact_path(path)
    }

    /// Sweep using the current time
    pub async fn sweep(&self) -> Result<SweepReport, CompilationError> {
        self.sweep_at(Utc::now()).await
    }

    /// Clear expired pointers, then delete unreferenced documents older than the grace period
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, CompilationError> {
        let mut report = SweepReport {
            expired_entries: self.repository.clear_expired_pointers(now).await?,
            ..Default::default()
        };

        let live: HashSet<String> = self
            .repository
            .referenced_artifacts()
            .await?
            .iter()
            .filter_map(|path| file_name(path))
            .collect();

        let clock: SystemTime = now.into();
        for path in FileManager::list_files(self.pipeline.ready_dir())? {
            let Some(name) = path.to_str().and_then(file_name) else {
                continue;
            };
            if live.contains(&name) {
                continue;
            }

            if FileManager::file_age(&path, clock)? < self.orphan_grace {
                report.kept_orphans += 1;
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => report.removed_files += 1,
                Err(e) => warn!("Failed to remove unreferenced document {:?}: {}", path, e),
            }
        }

        info!(
            "Sweep finished: {} expired, {} removed, {} young orphans kept",
            report.expired_entries, report.removed_files, report.kept_orphans
        );
        Ok(report)
    }

    /// Run the sweep every `interval` in the background
    pub fn spawn_periodic_sweep(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = cache.sweep().await {
                    error!("Periodic sweep failed: {}", e);
                }
            }
        })
    }
}

fn file_name(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
}
