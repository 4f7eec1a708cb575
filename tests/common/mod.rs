/*!
 * Common test utilities for the zpevnik test suite
 */

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

use zpevnik::app_config::Config;
use zpevnik::database::Repository;
use zpevnik::errors::{CompilationError, ToolchainStage};
use zpevnik::export::{SongbookTemplate, StepOutput, Toolchain};
use zpevnik::songbook_service::SongbookService;
use zpevnik::translator::Translator;

/// A well-formed song used across tests
pub const SAMPLE_SONG: &str = "[verse]\nStíny [E]dnů a snů se k obratníku [A]stáčí\n|: Ruce [E]snů :|2\n\n[chorus]\nSvětlo [F#mi]tvý prozradí proč já [E]vím";

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Holds a build at its first pass until released
#[derive(Default)]
pub struct StepGate {
    /// Notified when the build reaches the gate
    pub reached: Notify,
    /// Notify to let the build continue
    pub release: Notify,
}

/// Toolchain that produces an empty document on the second pass
#[derive(Default)]
pub struct FakeToolchain {
    /// Completed or attempted builds
    pub builds: AtomicUsize,
    /// Stage that reports failure, if any
    pub fail_at: Option<ToolchainStage>,
    /// Gate for the next build only
    pub gate: Mutex<Option<Arc<StepGate>>>,
}

impl FakeToolchain {
    pub fn failing_at(stage: ToolchainStage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Default::default()
        }
    }

    /// A toolchain whose first build waits at its first pass
    pub fn paused() -> (Self, Arc<StepGate>) {
        let gate = Arc::new(StepGate::default());
        let toolchain = Self {
            gate: Mutex::new(Some(gate.clone())),
            ..Default::default()
        };
        (toolchain, gate)
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn run_step(
        &self,
        stage: ToolchainStage,
        work_dir: &Path,
        stem: &str,
    ) -> Result<StepOutput, CompilationError> {
        if stage == ToolchainStage::FirstPass {
            self.builds.fetch_add(1, Ordering::SeqCst);

            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                gate.reached.notify_one();
                gate.release.notified().await;
            }
        }

        if self.fail_at == Some(stage) {
            return Ok(StepOutput {
                success: false,
                output: "This is pdfTeX\n! Undefined control sequence.\n".to_string(),
            });
        }

        if stage == ToolchainStage::SecondPass {
            fs::write(work_dir.join(format!("{}.pdf", stem)), "%PDF-1.5")?;
        }

        Ok(StepOutput {
            success: true,
            output: String::new(),
        })
    }
}

/// A service over an in-memory store and a fake toolchain
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
    pub service: SongbookService,
    pub toolchain: Arc<FakeToolchain>,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        Self::with_toolchain(FakeToolchain::default())
    }

    pub fn with_toolchain(toolchain: FakeToolchain) -> Result<Self> {
        let dir = create_temp_dir()?;
        let mut config = Config::default();
        config.storage.work_dir = dir.path().join("temp");
        config.storage.ready_dir = dir.path().join("done");

        let toolchain = Arc::new(toolchain);
        let service = SongbookService::new(
            Repository::new_in_memory()?,
            Arc::new(Translator::new(config.translator.clone())),
            toolchain.clone(),
            SongbookTemplate::builtin(),
            &config,
        );

        Ok(Self {
            dir,
            config,
            service,
            toolchain,
        })
    }

    pub fn ready_dir(&self) -> &Path {
        &self.config.storage.ready_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.storage.work_dir
    }
}
