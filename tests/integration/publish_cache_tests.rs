/*!
 * Integration tests for publishing and the publish cache sweeper
 */

use anyhow::Result;
use chrono::{Duration, Utc};
use zpevnik::database::models::{SongbookOptions, SongbookRecord, SongbookUpdate, Visibility};
use zpevnik::file_utils::FileManager;
use zpevnik::songbook_service::NewVariant;
use crate::common::{self, FakeToolchain, TestEnv};

async fn published_songbook(env: &TestEnv, title: &str) -> Result<SongbookRecord> {
    let song = env.service.create_song(title, Vec::new()).await?;
    let variant = env
        .service
        .create_variant(
            &song.id,
            "owner",
            NewVariant {
                title: title.to_string(),
                text: common::SAMPLE_SONG.to_string(),
                description: String::new(),
                visibility: Visibility::Public,
            },
        )
        .await?;
    let songbook = env
        .service
        .create_songbook(title, "owner", SongbookOptions::default())
        .await?;

    Ok(env
        .service
        .set_songbook_entry(&songbook.id, &song.id, &variant.id, 0)
        .await?)
}

/// Publishing twice reuses the document, editing forces a rebuild
#[tokio::test]
async fn test_publish_twiceThenEdit_shouldReuseThenRebuild() -> Result<()> {
    let env = TestEnv::new()?;
    let songbook = published_songbook(&env, "Táborák").await?;

    let first = env.service.publish_songbook(&songbook.id).await?;
    let first_expiry = env
        .service
        .find_songbook(&songbook.id)
        .await?
        .cache_expires_at
        .expect("expiry should be set after publishing");

    let second = env.service.publish_songbook(&songbook.id).await?;
    let second_expiry = env
        .service
        .find_songbook(&songbook.id)
        .await?
        .cache_expires_at
        .expect("expiry should be set after reuse");

    assert_eq!(first.link, second.link);
    assert_eq!(env.toolchain.build_count(), 1);
    assert!(second_expiry >= first_expiry);

    env.service
        .edit_songbook(
            &songbook.id,
            SongbookUpdate {
                title: Some("Táborák 2".to_string()),
                ..Default::default()
            },
        )
        .await?;
    let third = env.service.publish_songbook(&songbook.id).await?;

    assert_ne!(first.link, third.link);
    assert_eq!(env.toolchain.build_count(), 2);
    Ok(())
}

/// An edit committed while a build runs survives, and the build is not cached
#[tokio::test]
async fn test_publish_withEditDuringBuild_shouldKeepEditAndNotCache() -> Result<()> {
    let (toolchain, gate) = FakeToolchain::paused();
    let env = TestEnv::with_toolchain(toolchain)?;
    let songbook = published_songbook(&env, "Old title").await?;

    let service = env.service.clone();
    let songbook_id = songbook.id.clone();
    let publishing = tokio::spawn(async move { service.publish_songbook(&songbook_id).await });

    gate.reached.notified().await;
    env.service
        .edit_songbook(
            &songbook.id,
            SongbookUpdate {
                title: Some("New title".to_string()),
                ..Default::default()
            },
        )
        .await?;
    gate.release.notify_one();

    let outdated = publishing.await??;
    assert!(outdated.path.exists());

    let stored = env.service.find_songbook(&songbook.id).await?;
    assert_eq!(stored.title, "New title");
    assert!(stored.artifact_path.is_none());
    assert!(stored.cache_expires_at.is_none());

    let current = env.service.publish_songbook(&songbook.id).await?;
    assert_ne!(current.link, outdated.link);
    assert_eq!(env.toolchain.build_count(), 2);
    Ok(())
}

/// The published document lands in the ready directory and work files are gone
#[tokio::test]
async fn test_publish_shouldMoveDocumentToReadyDir() -> Result<()> {
    let env = TestEnv::new()?;
    let songbook = published_songbook(&env, "Book").await?;

    let link = env.service.publish_songbook(&songbook.id).await?;

    assert_eq!(link.link, format!("download/{}.pdf", link.stem));
    assert_eq!(FileManager::list_files(env.ready_dir())?, vec![link.path.clone()]);
    assert!(FileManager::list_files(env.work_dir())?.is_empty());
    Ok(())
}

/// A fresh superseded document survives the sweep, an old one does not
#[tokio::test]
async fn test_sweep_afterRebuild_shouldRemoveSupersededDocumentAfterGrace() -> Result<()> {
    let env = TestEnv::new()?;
    let songbook = published_songbook(&env, "Book").await?;

    let old = env.service.publish_songbook(&songbook.id).await?;
    env.service
        .edit_songbook(
            &songbook.id,
            SongbookUpdate {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await?;
    let current = env.service.publish_songbook(&songbook.id).await?;

    let report = env.service.sweep().await?;
    assert_eq!(report.removed_files, 0);
    assert_eq!(report.kept_orphans, 1);
    assert!(old.path.exists());

    let later = Utc::now() + Duration::hours(1);
    let report = env.service.publish_cache().sweep_at(later).await?;
    assert_eq!(report.expired_entries, 0);
    assert_eq!(report.removed_files, 1);
    assert!(!old.path.exists());
    assert!(current.path.exists());
    Ok(())
}

/// Expired pointers are cleared and their documents removed
#[tokio::test]
async fn test_sweep_afterExpiration_shouldClearPointer() -> Result<()> {
    let env = TestEnv::new()?;
    let songbook = published_songbook(&env, "Book").await?;
    let link = env.service.publish_songbook(&songbook.id).await?;

    let far_future = Utc::now() + Duration::days(30);
    let report = env.service.publish_cache().sweep_at(far_future).await?;

    assert_eq!(report.expired_entries, 1);
    assert_eq!(report.removed_files, 1);
    assert!(!link.path.exists());

    let stored = env.service.find_songbook(&songbook.id).await?;
    assert!(stored.artifact_path.is_none());

    let rebuilt = env.service.publish_songbook(&songbook.id).await?;
    assert!(rebuilt.path.exists());
    assert_eq!(env.toolchain.build_count(), 2);
    Ok(())
}

/// Documents of deleted songbooks become orphans
#[tokio::test]
async fn test_sweep_afterDeletingSongbook_shouldRemoveItsDocument() -> Result<()> {
    let env = TestEnv::new()?;
    let songbook = published_songbook(&env, "Book").await?;
    let link = env.service.publish_songbook(&songbook.id).await?;

    env.service.delete_songbook(&songbook.id).await?;
    let report = env
        .service
        .publish_cache()
        .sweep_at(Utc::now() + Duration::hours(1))
        .await?;

    assert_eq!(report.removed_files, 1);
    assert!(!link.path.exists());
    Ok(())
}

/// Publishing works from a plain synchronous caller driving its own runtime
#[test]
fn test_publish_fromSyncContext_shouldComplete() -> Result<()> {
    let env = TestEnv::new()?;

    let link = tokio_test::block_on(async {
        let songbook = published_songbook(&env, "Sync").await?;
        Ok::<_, anyhow::Error>(env.service.publish_songbook(&songbook.id).await?)
    })?;

    assert!(link.path.exists());
    assert_eq!(env.toolchain.build_count(), 1);
    Ok(())
}
