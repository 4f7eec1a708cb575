/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::time::SystemTime;
use zpevnik::file_utils::FileManager;
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "song.txt", "[verse]")?;

    assert!(FileManager::file_exists(&test_file));

    Ok(())
}

/// Test that file_exists returns false for non-existent files and directories
#[test]
fn test_file_exists_withMissingFileOrDirectory_shouldReturnFalse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;

    assert!(!FileManager::file_exists("non_existent_file.tmp"));
    assert!(!FileManager::file_exists(temp_dir.path()));

    Ok(())
}

/// Test that write_to_file creates missing parent directories
#[test]
fn test_write_to_file_withNestedPath_shouldCreateParents() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("songs").join("temp").join("abc.sbd");

    FileManager::write_to_file(&path, "\\beginsong{A}[by={}] \\endsong")?;

    assert_eq!(FileManager::read_to_string(&path)?, "\\beginsong{A}[by={}] \\endsong");
    Ok(())
}

/// Test that only files sharing a stem are removed
#[test]
fn test_remove_files_with_stem_withMixedFiles_shouldRemoveOnlyStem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    for name in ["a1b2.tex", "a1b2.sxd", "a1b2.sbx", "a1b2.aux", "c3d4.tex"] {
        common::create_test_file(temp_dir.path(), name, "")?;
    }

    let removed = FileManager::remove_files_with_stem(temp_dir.path(), "a1b2")?;

    assert_eq!(removed, 4);
    assert_eq!(FileManager::list_files(temp_dir.path())?.len(), 1);
    Ok(())
}

/// Test that list_files does not descend into subdirectories
#[test]
fn test_list_files_withSubdirectory_shouldListTopLevelOnly() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "top.pdf", "")?;
    FileManager::write_to_file(temp_dir.path().join("nested").join("deep.pdf"), "")?;

    let files = FileManager::list_files(temp_dir.path())?;

    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("top.pdf"));
    Ok(())
}

/// Test that a fresh file is young
#[test]
fn test_file_age_withFreshFile_shouldBeShort() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "fresh.pdf", "")?;

    let age = FileManager::file_age(&path, SystemTime::now())?;

    assert!(age.as_secs() < 60);
    Ok(())
}
