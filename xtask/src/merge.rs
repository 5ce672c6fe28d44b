//! xtask merge — fold a PlatformIO ESP32 build into one flashable image.
//!
//! Resolves the environment(s), locates `esptool.py` once, then runs
//! `esptool merge_bin` per environment. Output defaults to
//! `scripts/build/full_firmware_<env>.bin` under the project root.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;
use firmware_merge::orchestrator::Observer;
use firmware_merge::toolchain::{default_core_dir, CORE_DIR_ENV, PYTHON_ENV};
use firmware_merge::{
    resolve, MergeError, MergeInvocation, Orchestrator, Outcome, ProcessRunner, ResolveRequest,
    ResolvedTarget, RunReport, Toolchain,
};

#[derive(Debug, clap::Args)]
pub struct MergeArgs {
    /// PlatformIO environment to merge (overrides platformio.ini and build detection)
    #[arg(long, value_name = "NAME")]
    pub env: Option<String>,

    /// Write the merged image here instead of scripts/build/ (single environment only)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Merge every environment under .pio/build that has a firmware.bin
    #[arg(long)]
    pub all: bool,

    /// PlatformIO project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// PlatformIO core directory holding packages/ and penv/
    #[arg(long, value_name = "DIR", env = CORE_DIR_ENV)]
    pub toolchain_dir: Option<PathBuf>,

    /// Interpreter for esptool when PlatformIO's bundled penv is absent
    #[arg(long, value_name = "PATH", env = PYTHON_ENV)]
    pub python: Option<PathBuf>,

    /// Print the esptool command without running it
    #[arg(long)]
    pub dry_run: bool,
}

impl MergeArgs {
    fn request(&self) -> ResolveRequest {
        ResolveRequest {
            env: self.env.clone(),
            all: self.all,
            out: self.out.clone(),
        }
    }
}

pub fn run(args: &MergeArgs) -> Result<()> {
    let request = args.request();
    // Flag conflicts are reported before anything touches the filesystem.
    request.check().map_err(report)?;

    let project_root = match &args.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    tracing::debug!(root = %project_root.display(), "project root");

    println!();
    let target = resolve(&request, &project_root).map_err(report)?;

    let core_dir = args
        .toolchain_dir
        .clone()
        .or_else(default_core_dir)
        .context("Could not determine the PlatformIO core directory; pass --toolchain-dir")?;
    let toolchain = Toolchain::discover(&core_dir, args.python.as_deref()).map_err(report)?;
    println!(
        "{}",
        format!("Found esptool.py at: {}", toolchain.esptool.display()).dimmed()
    );

    let total_start = Instant::now();
    let mut orchestrator =
        Orchestrator::new(&project_root, toolchain, ProcessRunner).dry_run(args.dry_run);
    let mut observer = TerminalObserver::default();
    let report_result = orchestrator
        .run(&target, args.out.as_deref(), &mut observer)
        .map_err(report)?;

    summarize(&target, &report_result, total_start)
}

/// Print a failure with the hint that fits it, and hand it back for `?`.
fn report(err: MergeError) -> anyhow::Error {
    eprintln!("{}", format!("✗ {err}").red().bold());
    match &err {
        MergeError::Unresolved { available } => {
            if !available.is_empty() {
                eprintln!("   Available environments: {}", available.join(", "));
            }
            eprintln!(
                "   {}",
                "Pass --env <name> or set default_envs in platformio.ini.".dimmed()
            );
        }
        MergeError::NoBuiltEnvironments { available, .. } => {
            if !available.is_empty() {
                eprintln!(
                    "   Unbuilt environments (no firmware.bin): {}",
                    available.join(", ")
                );
            }
            eprintln!("   {}", "Build first: pio run".dimmed());
        }
        MergeError::ToolNotFound { searched } => {
            eprintln!("   Checked in: {}", searched.display());
            eprintln!(
                "   {}",
                "Please ensure PlatformIO is installed and the esp32 platform is downloaded."
                    .dimmed()
            );
        }
        MergeError::MissingArtifacts { env, missing } => print_missing(env, missing),
        _ => {}
    }
    eprintln!();
    anyhow::Error::new(err)
}

fn print_missing(env: &str, missing: &[PathBuf]) {
    eprintln!("   The following build artifacts are missing:");
    for path in missing {
        eprintln!("     - {}", path.display());
    }
    eprintln!(
        "   {}",
        format!("Please build this env first: pio run -e {env}").dimmed()
    );
}

#[derive(Default)]
struct TerminalObserver {
    started: Option<Instant>,
}

impl Observer for TerminalObserver {
    fn merging(&mut self, invocation: &MergeInvocation) {
        self.started = Some(Instant::now());
        println!(
            "{}",
            format!("🔨 Using PlatformIO environment: {}", invocation.env)
                .cyan()
                .bold()
        );
        println!("   {}", "Executing command:".dimmed());
        println!("   {invocation}");
        println!("{}", "-".repeat(20).dimmed());
    }

    fn finished(&mut self, outcome: &Outcome) {
        let elapsed = self
            .started
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or_default();
        match &outcome.result {
            Ok(path) => {
                println!("{}", "-".repeat(20).dimmed());
                println!(
                    "{}",
                    format!(
                        "✓ Full firmware generated at: {} ({:.2}s)",
                        path.display(),
                        elapsed
                    )
                    .green()
                );
            }
            Err(err) => {
                eprintln!("{}", format!("✗ {}: {err}", outcome.env).red().bold());
                if let MergeError::MissingArtifacts { env, missing } = err {
                    print_missing(env, missing);
                }
            }
        }
        println!();
    }
}

fn summarize(target: &ResolvedTarget, report: &RunReport, started: Instant) -> Result<()> {
    if !target.is_batch() {
        return Ok(());
    }

    let ok = report.succeeded().count();
    let failed: Vec<&str> = report.failed().map(|o| o.env.name()).collect();
    if failed.is_empty() {
        println!(
            "{}",
            format!(
                "✓ Merged {ok} environment(s) in {:.2}s",
                started.elapsed().as_secs_f64()
            )
            .green()
            .bold()
        );
        println!();
        return Ok(());
    }

    eprintln!(
        "{}",
        format!(
            "✗ {} of {} environment(s) failed: {}",
            failed.len(),
            report.outcomes.len(),
            failed.join(", ")
        )
        .red()
        .bold()
    );
    anyhow::bail!("Merge failed for {}", failed.join(", "))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        merge: MergeArgs,
    }

    fn parse(args: &[&str]) -> MergeArgs {
        let argv = std::iter::once("merge").chain(args.iter().copied());
        Harness::try_parse_from(argv).unwrap().merge
    }

    #[test]
    fn flags_map_onto_request() {
        let args = parse(&["--env", "esp32dev", "--out", "fw.bin"]);
        let req = args.request();
        assert_eq!(req.env.as_deref(), Some("esp32dev"));
        assert_eq!(req.out, Some(PathBuf::from("fw.bin")));
        assert!(!req.all);
    }

    #[test]
    fn python_flag_is_parsed() {
        let args = parse(&["--python", "/opt/python3.12/bin/python3"]);
        assert_eq!(
            args.python.as_deref(),
            Some(std::path::Path::new("/opt/python3.12/bin/python3"))
        );
    }

    #[test]
    fn all_with_out_fails_without_a_project() {
        let args = parse(&[
            "--all",
            "--out",
            "fw.bin",
            "--project-dir",
            "/nonexistent/project",
        ]);
        let err = run(&args).unwrap_err();
        let merge_err = err.downcast_ref::<MergeError>().unwrap();
        assert!(matches!(merge_err, MergeError::IncompatibleFlags { .. }));
    }

    #[test]
    fn dry_run_reports_success_without_esptool_running() {
        let project = TempDir::new().unwrap();
        let core = TempDir::new().unwrap();

        let build = project.path().join(".pio/build/esp32dev");
        fs::create_dir_all(&build).unwrap();
        for f in ["bootloader.bin", "partitions.bin", "firmware.bin"] {
            fs::write(build.join(f), b"BIN").unwrap();
        }
        let tool = core.path().join("packages/tool-esptoolpy");
        fs::create_dir_all(&tool).unwrap();
        fs::write(tool.join("esptool.py"), b"").unwrap();

        let args = parse(&[
            "--dry-run",
            "--project-dir",
            project.path().to_str().unwrap(),
            "--toolchain-dir",
            core.path().to_str().unwrap(),
        ]);
        run(&args).unwrap();
        assert!(!project.path().join("scripts/build").exists());
    }

    #[test]
    fn missing_toolchain_is_fatal() {
        let project = TempDir::new().unwrap();
        let core = TempDir::new().unwrap();
        let args = parse(&[
            "--env",
            "esp32dev",
            "--project-dir",
            project.path().to_str().unwrap(),
            "--toolchain-dir",
            core.path().to_str().unwrap(),
        ]);
        let err = run(&args).unwrap_err();
        let merge_err = err.downcast_ref::<MergeError>().unwrap();
        assert!(matches!(merge_err, MergeError::ToolNotFound { .. }));
    }
}
