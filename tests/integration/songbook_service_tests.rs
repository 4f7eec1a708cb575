/*!
 * Integration tests for the songbook service and cache invalidation
 */

use anyhow::Result;
use zpevnik::database::models::{
    SongbookOptions, SongbookRecord, SongbookUpdate, VariantRecord, VariantUpdate, Visibility,
};
use zpevnik::errors::{CompilationError, ServiceError, ToolchainStage};
use zpevnik::file_utils::FileManager;
use zpevnik::songbook_service::NewVariant;
use zpevnik::translator::DiagnosticCode;
use crate::common::{self, FakeToolchain, TestEnv};

fn new_variant(text: &str) -> NewVariant {
    NewVariant {
        title: "Stíny".to_string(),
        text: text.to_string(),
        description: String::new(),
        visibility: Visibility::Public,
    }
}

async fn seeded(env: &TestEnv) -> Result<(SongbookRecord, VariantRecord)> {
    let song = env
        .service
        .create_song("Stíny", vec!["Kapela".to_string()])
        .await?;
    let variant = env
        .service
        .create_variant(&song.id, "owner", new_variant(common::SAMPLE_SONG))
        .await?;
    let songbook = env
        .service
        .create_songbook("Táborák", "owner", SongbookOptions::default())
        .await?;
    let songbook = env
        .service
        .set_songbook_entry(&songbook.id, &song.id, &variant.id, 0)
        .await?;

    Ok((songbook, variant))
}

/// Rejected markup is never stored
#[tokio::test]
async fn test_create_variant_withInvalidMarkup_shouldRefuseAndStoreNothing() -> Result<()> {
    let env = TestEnv::new()?;
    let song = env.service.create_song("Song", Vec::new()).await?;

    let result = env
        .service
        .create_variant(&song.id, "owner", new_variant("no opening tag"))
        .await;

    match result {
        Err(ServiceError::Validation(diagnostics)) => {
            assert_eq!(diagnostics[0].code, DiagnosticCode::MissingStartingBlock);
        }
        other => panic!("Expected validation error, got {:?}", other.map(|v| v.id)),
    }
    let stats = env.service.repository().connection().stats()?;
    assert_eq!(stats.variant_count, 0);
    Ok(())
}

/// Unknown ids surface as not found
#[tokio::test]
async fn test_operations_withUnknownIds_shouldBeNotFound() -> Result<()> {
    let env = TestEnv::new()?;

    let result = env
        .service
        .create_variant("missing-song", "owner", new_variant("[verse] a"))
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound { kind: "Song", .. })));

    let result = env.service.publish_songbook("missing-book").await;
    assert!(matches!(result, Err(ServiceError::NotFound { kind: "Songbook", .. })));

    let result = env.service.delete_variant("missing-variant").await;
    assert!(matches!(result, Err(ServiceError::NotFound { kind: "Variant", .. })));
    Ok(())
}

/// Editing the text of a variant clears its cached fragment in the store
#[tokio::test]
async fn test_edit_variant_afterExport_shouldClearFragmentCache() -> Result<()> {
    let env = TestEnv::new()?;
    let (_, variant) = seeded(&env).await?;

    env.service
        .export_variant(&variant.id, &SongbookOptions::default())
        .await?;
    let cached = env.service.find_variant(&variant.id).await?;
    assert!(cached.cached_fragment.is_some());

    let edited = env
        .service
        .edit_variant(
            &variant.id,
            VariantUpdate {
                text: Some("[chorus] New words".to_string()),
                ..Default::default()
            },
        )
        .await?;

    assert!(edited.cached_fragment.is_none());
    let stored = env.service.find_variant(&variant.id).await?;
    assert!(stored.cached_fragment.is_none());
    assert_eq!(stored.text, "[chorus] New words");
    Ok(())
}

/// Invalid new text leaves the variant untouched
#[tokio::test]
async fn test_edit_variant_withInvalidText_shouldKeepVariant() -> Result<()> {
    let env = TestEnv::new()?;
    let (_, variant) = seeded(&env).await?;

    let result = env
        .service
        .edit_variant(
            &variant.id,
            VariantUpdate {
                text: Some("[verse] 100% wrong".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(ServiceError::Validation(_))));
    let stored = env.service.find_variant(&variant.id).await?;
    assert_eq!(stored.text, common::SAMPLE_SONG);
    Ok(())
}

/// Changing songbook options clears the publish cache
#[tokio::test]
async fn test_edit_songbook_options_shouldClearPublishCache() -> Result<()> {
    let env = TestEnv::new()?;
    let (songbook, _) = seeded(&env).await?;

    env.service.publish_songbook(&songbook.id).await?;
    assert!(env.service.find_songbook(&songbook.id).await?.artifact_path.is_some());

    env.service
        .edit_songbook(
            &songbook.id,
            SongbookUpdate {
                options: Some(SongbookOptions {
                    columns: 1,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await?;

    let stored = env.service.find_songbook(&songbook.id).await?;
    assert!(stored.artifact_path.is_none());
    assert!(stored.cache_expires_at.is_none());
    assert_eq!(stored.options.columns, 1);
    Ok(())
}

/// Membership changes clear the publish cache
#[tokio::test]
async fn test_songbook_entries_changes_shouldClearPublishCache() -> Result<()> {
    let env = TestEnv::new()?;
    let (songbook, variant) = seeded(&env).await?;

    env.service.publish_songbook(&songbook.id).await?;
    let updated = env
        .service
        .remove_songbook_entry(&songbook.id, &variant.id)
        .await?;
    assert!(updated.entries.is_empty());
    assert!(env.service.find_songbook(&songbook.id).await?.artifact_path.is_none());

    let result = env.service.remove_songbook_entry(&songbook.id, &variant.id).await;
    assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    Ok(())
}

/// A variant of another song cannot be placed under a different song
#[tokio::test]
async fn test_set_songbook_entry_withForeignVariant_shouldFail() -> Result<()> {
    let env = TestEnv::new()?;
    let (songbook, variant) = seeded(&env).await?;
    let other = env.service.create_song("Other", Vec::new()).await?;

    let result = env
        .service
        .set_songbook_entry(&songbook.id, &other.id, &variant.id, 1)
        .await;

    assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    Ok(())
}

/// Deleting a variant drops it from songbooks and clears their publish cache
#[tokio::test]
async fn test_delete_variant_shouldDropSongbookEntries() -> Result<()> {
    let env = TestEnv::new()?;
    let (songbook, variant) = seeded(&env).await?;
    env.service.publish_songbook(&songbook.id).await?;

    env.service.delete_variant(&variant.id).await?;

    let stored = env.service.find_songbook(&songbook.id).await?;
    assert!(stored.entries.is_empty());
    assert!(stored.artifact_path.is_none());
    Ok(())
}

/// A stored variant with broken markup rejects the whole songbook
#[tokio::test]
async fn test_publish_songbook_withBrokenVariant_shouldReportRejection() -> Result<()> {
    let env = TestEnv::new()?;
    let (songbook, _) = seeded(&env).await?;
    let song = env.service.create_song("Broken", Vec::new()).await?;

    let broken = VariantRecord::new(
        "broken-variant".to_string(),
        song.id.clone(),
        "owner".to_string(),
        "Broken".to_string(),
        "[verse] |: |: twice".to_string(),
        String::new(),
        Visibility::Private,
    );
    env.service.repository().create_variant(&broken).await?;
    env.service
        .set_songbook_entry(&songbook.id, &song.id, &broken.id, 1)
        .await?;

    let result = env.service.publish_songbook(&songbook.id).await;

    match result {
        Err(ServiceError::Compilation(CompilationError::Rejected(rejection))) => {
            assert_eq!(rejection.variant_id, "broken-variant");
            assert!(rejection
                .diagnostics
                .iter()
                .any(|d| d.code == DiagnosticCode::NestedRepetition));
        }
        other => panic!("Expected rejection, got {:?}", other),
    }
    assert_eq!(env.toolchain.build_count(), 0);
    Ok(())
}

/// A failing toolchain step leaves no cache pointer and no work files
#[tokio::test]
async fn test_publish_songbook_withFailingToolchain_shouldNotCache() -> Result<()> {
    let env = TestEnv::with_toolchain(FakeToolchain::failing_at(ToolchainStage::SecondPass))?;
    let (songbook, _) = seeded(&env).await?;

    let result = env.service.publish_songbook(&songbook.id).await;

    match result {
        Err(ServiceError::Compilation(CompilationError::Toolchain { stage, message })) => {
            assert_eq!(stage, ToolchainStage::SecondPass);
            assert_eq!(message, "! Undefined control sequence.");
        }
        other => panic!("Expected toolchain error, got {:?}", other),
    }
    assert!(env.service.find_songbook(&songbook.id).await?.artifact_path.is_none());
    assert!(FileManager::list_files(env.work_dir())?.is_empty());
    Ok(())
}

/// Exporting a single variant publishes a document without caching it on a songbook
#[tokio::test]
async fn test_export_variant_shouldProduceDocumentLink() -> Result<()> {
    let env = TestEnv::new()?;
    let (songbook, variant) = seeded(&env).await?;

    let link = env
        .service
        .export_variant(&variant.id, &SongbookOptions::default())
        .await?;

    assert!(link.link.starts_with("download/"));
    assert!(link.link.ends_with(".pdf"));
    assert!(link.path.starts_with(env.ready_dir()));
    assert!(link.path.exists());
    assert!(env.service.find_songbook(&songbook.id).await?.artifact_path.is_none());
    Ok(())
}
