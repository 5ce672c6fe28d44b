//! Locating `esptool.py` and a Python to run it with.
//!
//! Lookup is two-stage: the unversioned package directory first, then any
//! `tool-esptoolpy*` sibling. Siblings are tried in sorted name order, so with
//! several versioned installs the lexicographically first wins, which is not
//! necessarily the newest.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};

use crate::error::{MergeError, Result};

/// Environment variable PlatformIO uses to relocate its core directory.
pub const CORE_DIR_ENV: &str = "PLATFORMIO_CORE_DIR";
/// Interpreter to use when PlatformIO's bundled one is absent.
pub const PYTHON_ENV: &str = "PYTHON";

const PACKAGES_DIR: &str = "packages";
const ESPTOOL_PACKAGE: &str = "tool-esptoolpy";
const ESPTOOL_PACKAGE_PATTERN: &str = "tool-esptoolpy*";
const ESPTOOL_SCRIPT: &str = "esptool.py";

#[cfg(windows)]
const BUNDLED_PYTHON: &[&str] = &["penv", "Scripts", "python.exe"];
#[cfg(not(windows))]
const BUNDLED_PYTHON: &[&str] = &["penv", "bin", "python"];

#[cfg(windows)]
const HOST_PYTHON: &str = "python";
#[cfg(not(windows))]
const HOST_PYTHON: &str = "python3";

/// Resolved once per run and shared read-only by every environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub esptool: PathBuf,
    pub python: PathBuf,
}

impl Toolchain {
    pub fn new(esptool: impl Into<PathBuf>, python: impl Into<PathBuf>) -> Self {
        Self {
            esptool: esptool.into(),
            python: python.into(),
        }
    }

    /// Find `esptool.py` and an interpreter under a PlatformIO core directory.
    ///
    /// `python` is the operator's preferred interpreter (`PYTHON`); see [`find_python`].
    pub fn discover(core_dir: &Path, python: Option<&Path>) -> Result<Self> {
        let esptool = find_esptool(core_dir)?;
        let python = find_python(core_dir, python);
        tracing::info!(
            esptool = %esptool.display(),
            python = %python.display(),
            "toolchain resolved"
        );
        Ok(Self { esptool, python })
    }
}

/// `~/.platformio`, when a home directory can be determined.
pub fn default_core_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".platformio"))
}

pub fn find_esptool(core_dir: &Path) -> Result<PathBuf> {
    let packages = core_dir.join(PACKAGES_DIR);

    let conventional = packages.join(ESPTOOL_PACKAGE).join(ESPTOOL_SCRIPT);
    if conventional.is_file() {
        return Ok(conventional);
    }

    let candidates = versioned_candidates(&packages)?;
    if candidates.len() > 1 {
        tracing::warn!(
            count = candidates.len(),
            chosen = %candidates.first().map(|p| p.display().to_string()).unwrap_or_default(),
            "multiple esptool installations found; using the first"
        );
    }
    candidates
        .into_iter()
        .next()
        .ok_or(MergeError::ToolNotFound { searched: packages })
}

/// `esptool.py` paths inside `packages/tool-esptoolpy*`, sorted by directory name.
fn versioned_candidates(packages: &Path) -> Result<Vec<PathBuf>> {
    let Ok(entries) = fs::read_dir(packages) else {
        return Ok(Vec::new());
    };
    let matcher = package_matcher()?;

    let mut found: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| matcher.is_match(name))
        })
        .map(|dir| dir.join(ESPTOOL_SCRIPT))
        .filter(|script| script.is_file())
        .collect();
    found.sort();
    Ok(found)
}

fn package_matcher() -> Result<GlobMatcher> {
    Glob::new(ESPTOOL_PACKAGE_PATTERN)
        .map(|g| g.compile_matcher())
        .map_err(MergeError::from)
}

/// Interpreter precedence: PlatformIO's bundled `penv`, then `preferred`
/// (from `PYTHON`), then the host Python on `PATH`.
pub fn find_python(core_dir: &Path, preferred: Option<&Path>) -> PathBuf {
    let bundled = BUNDLED_PYTHON
        .iter()
        .fold(core_dir.to_path_buf(), |acc, part| acc.join(part));
    if bundled.is_file() {
        return bundled;
    }
    tracing::debug!(missing = %bundled.display(), "no bundled python");
    match preferred.filter(|p| !p.as_os_str().is_empty()) {
        Some(python) => python.to_path_buf(),
        None => PathBuf::from(HOST_PYTHON),
    }
}
