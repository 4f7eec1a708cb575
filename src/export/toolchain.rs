/*!
 * External typesetting toolchain.
 *
 * A document is built in three steps that always run in the same order:
 * the first typesetting pass writes raw index entries, the indexer sorts
 * them, and the second pass embeds the finished index. Any failing step
 * aborts the build.
 */

use async_trait::async_trait;
use log::{debug, error};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::ToolchainConfig;
use crate::errors::{CompilationError, ToolchainStage};

/// Outcome of a single toolchain step
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Whether the step exited with a zero status
    pub success: bool,
    /// Captured standard output followed by standard error
    pub output: String,
}

/// Runs the individual steps of a build
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run `stage` for the document `stem` inside `work_dir`
    async fn run_step(
        &self,
        stage: ToolchainStage,
        work_dir: &Path,
        stem: &str,
    ) -> Result<StepOutput, CompilationError>;
}

/// Run every stage in order, stopping at the first failure
pub async fn run_all(
    toolchain: &dyn Toolchain,
    work_dir: &Path,
    stem: &str,
) -> Result<(), CompilationError> {
    for stage in ToolchainStage::ORDER {
        debug!("Running {:?} for {}", stage, stem);
        let step = toolchain.run_step(stage, work_dir, stem).await?;

        if !step.success {
            let message = extract_fatal_lines(&step.output);
            error!("Toolchain step {:?} failed for {}", stage, stem);
            return Err(CompilationError::Toolchain { stage, message });
        }
    }

    Ok(())
}

/// Lines of toolchain output marked as fatal (`!` prefix), in order
pub fn extract_fatal_lines(output: &str) -> String {
    output
        .lines()
        .filter(|line| line.starts_with('!'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Toolchain running configured programs as child processes
#[derive(Debug, Clone)]
pub struct ProcessToolchain {
    config: ToolchainConfig,
}

impl ProcessToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Program and arguments for a stage
    pub fn command_line(&self, stage: ToolchainStage, stem: &str) -> (String, Vec<String>) {
        match stage {
            ToolchainStage::FirstPass | ToolchainStage::SecondPass => {
                let mut args = self.config.typesetter_args.clone();
                args.push(format!("{}.tex", stem));
                (self.config.typesetter.clone(), args)
            }
            ToolchainStage::Index => (
                self.config.indexer.clone(),
                vec![format!("{}.sxd", stem), format!("{}.sbx", stem)],
            ),
        }
    }
}

#[async_trait]
impl Toolchain for ProcessToolchain {
    async fn run_step(
        &self,
        stage: ToolchainStage,
        work_dir: &Path,
        stem: &str,
    ) -> Result<StepOutput, CompilationError> {
        let (program, args) = self.command_line(stage, stem);

        let child = Command::new(&program)
            .args(&args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let result = match self.config.step_timeout_secs {
            Some(secs) => {
                tokio::select! {
                    result = child => result,
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                        return Err(CompilationError::Toolchain {
                            stage,
                            message: format!("! '{}' timed out after {} seconds", program, secs),
                        });
                    }
                }
            }
            None => child.await,
        };

        let output = result.map_err(|e| CompilationError::Toolchain {
            stage,
            message: format!("! Failed to run '{}': {}", program, e),
        })?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(StepOutput {
            success: output.status.success(),
            output: captured,
        })
    }
}
