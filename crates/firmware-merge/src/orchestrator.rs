//! Merge orchestration: validate, build the invocation, run it, report.
//!
//! Environments are processed one at a time in the order the resolver
//! produced them. In batch mode a failed environment is recorded and the
//! next one is attempted; a single-environment run returns its error.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::environment::Environment;
use crate::error::{MergeError, Result};
use crate::invocation::{default_output_path, MergeInvocation};
use crate::resolver::ResolvedTarget;
use crate::toolchain::Toolchain;

/// Executes a merge. Implemented by [`ProcessRunner`]; tests substitute a fake.
pub trait CommandRunner {
    fn run(&mut self, invocation: &MergeInvocation) -> Result<()>;
}

/// Spawns the interpreter as a blocking child with inherited stdio, so
/// esptool's progress and diagnostics reach the operator directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&mut self, invocation: &MergeInvocation) -> Result<()> {
        let status = Command::new(invocation.program())
            .args(invocation.args())
            .status()
            .map_err(|source| MergeError::Launch {
                program: invocation.program().to_path_buf(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(MergeError::Execution {
                env: invocation.env.name().to_owned(),
                status,
            })
        }
    }
}

/// Progress hooks for the caller's UI. Both methods default to no-ops.
pub trait Observer {
    fn merging(&mut self, _invocation: &MergeInvocation) {}
    fn finished(&mut self, _outcome: &Outcome) {}
}

impl Observer for () {}

/// Result of processing one environment.
#[derive(Debug)]
pub struct Outcome {
    pub env: Environment,
    pub result: Result<PathBuf>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<Outcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(Outcome::is_success)
    }
}

pub struct Orchestrator<R> {
    project_root: PathBuf,
    toolchain: Toolchain,
    runner: R,
    dry_run: bool,
}

impl<R: CommandRunner> Orchestrator<R> {
    pub fn new(project_root: impl Into<PathBuf>, toolchain: Toolchain, runner: R) -> Self {
        Self {
            project_root: project_root.into(),
            toolchain,
            runner,
            dry_run: false,
        }
    }

    /// Build and report invocations without executing them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Merge every environment in `target`.
    ///
    /// `out` is honoured only for [`ResolvedTarget::Single`]; the resolver has
    /// already rejected it for batch runs.
    pub fn run(
        &mut self,
        target: &ResolvedTarget,
        out: Option<&Path>,
        observer: &mut dyn Observer,
    ) -> Result<RunReport> {
        match target {
            ResolvedTarget::Single(env) => {
                let output = self.process(env, out, observer)?;
                let outcome = Outcome {
                    env: env.clone(),
                    result: Ok(output),
                };
                observer.finished(&outcome);
                Ok(RunReport {
                    outcomes: vec![outcome],
                })
            }
            ResolvedTarget::Batch(envs) => {
                let mut report = RunReport::default();
                for env in envs {
                    let result = self.process(env, None, observer);
                    if let Err(e) = &result {
                        tracing::warn!(env = %env, error = %e, "merge failed; continuing");
                    }
                    let outcome = Outcome {
                        env: env.clone(),
                        result,
                    };
                    observer.finished(&outcome);
                    report.outcomes.push(outcome);
                }
                Ok(report)
            }
        }
    }

    /// Validate artifacts and merge a single environment. Returns the output path.
    pub fn process(
        &mut self,
        env: &Environment,
        out: Option<&Path>,
        observer: &mut dyn Observer,
    ) -> Result<PathBuf> {
        let artifacts = env.artifacts(&self.project_root);
        artifacts.validate(env)?;

        let output = out
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(&self.project_root, env));
        let invocation = MergeInvocation::new(env.clone(), &self.toolchain, &artifacts, output);

        observer.merging(&invocation);
        if self.dry_run {
            tracing::info!(env = %env, "dry run; merge skipped");
            return Ok(invocation.output);
        }

        ensure_parent_dir(&invocation.output)?;
        tracing::info!(env = %env, output = %invocation.output.display(), "merging");
        self.runner.run(&invocation)?;
        Ok(invocation.output)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| MergeError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
