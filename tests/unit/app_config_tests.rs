/*!
 * Tests for application configuration
 */

use anyhow::Result;
use std::path::PathBuf;
use zpevnik::app_config::{Config, LogLevel};
use crate::common;

/// Test that the default configuration is valid
#[test]
fn test_default_config_shouldBeValid() {
    let config = Config::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.storage.work_dir, PathBuf::from("songs/temp"));
    assert_eq!(config.storage.ready_dir, PathBuf::from("songs/done"));
    assert_eq!(config.toolchain.typesetter, "pdflatex");
    assert_eq!(config.toolchain.indexer, "songidx");
    assert_eq!(config.cache_ttl(), chrono::Duration::days(14));
}

/// Test loading a config file with overrides
#[test]
fn test_load_or_create_withExistingFile_shouldApplyValues() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{
            "toolchain": {"typesetter": "lualatex", "step_timeout_secs": 300},
            "translator": {"drop_unknown_tags": false},
            "log_level": "debug"
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.toolchain.typesetter, "lualatex");
    assert_eq!(config.toolchain.step_timeout_secs, Some(300));
    assert_eq!(config.toolchain.typesetter_args, vec!["-halt-on-error".to_string()]);
    assert!(!config.translator.drop_unknown_tags);
    assert_eq!(config.log_level, LogLevel::Debug);
    Ok(())
}

/// Test that a malformed config file is an error
#[test]
fn test_load_or_create_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

/// Test that validation rejects a missing template file and an empty indexer
#[test]
fn test_validate_withBrokenToolchainSettings_shouldFail() {
    let mut config = Config::default();
    config.storage.template_path = Some(PathBuf::from("/definitely/missing/template.tex"));
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.toolchain.indexer = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.cache.sweep_interval_secs = 0;
    assert!(config.validate().is_err());
}
