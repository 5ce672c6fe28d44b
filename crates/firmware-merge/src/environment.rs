//! Build environments and the artifacts PlatformIO leaves behind for them.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MergeError, Result};

/// PlatformIO build-output root, relative to the project root.
pub const BUILD_ROOT: &str = ".pio/build";

pub const BOOTLOADER_BIN: &str = "bootloader.bin";
pub const PARTITIONS_BIN: &str = "partitions.bin";
pub const FIRMWARE_BIN: &str = "firmware.bin";

/// File whose presence marks an environment as built.
pub const COMPLETION_MARKER: &str = FIRMWARE_BIN;

/// A named PlatformIO build configuration (`[env:NAME]`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Environment {
    name: String,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<project_root>/.pio/build/<name>`
    pub fn build_dir(&self, project_root: &Path) -> PathBuf {
        build_root(project_root).join(&self.name)
    }

    pub fn artifacts(&self, project_root: &Path) -> ArtifactSet {
        ArtifactSet::for_build_dir(&self.build_dir(project_root))
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// `<project_root>/.pio/build`
pub fn build_root(project_root: &Path) -> PathBuf {
    project_root.join(BUILD_ROOT)
}

/// The three images `merge_bin` needs for one environment.
///
/// Paths are computed, not checked; existence is tested by [`ArtifactSet::validate`]
/// at merge time and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub bootloader: PathBuf,
    pub partitions: PathBuf,
    pub application: PathBuf,
}

impl ArtifactSet {
    pub fn for_build_dir(dir: &Path) -> Self {
        Self {
            bootloader: dir.join(BOOTLOADER_BIN),
            partitions: dir.join(PARTITIONS_BIN),
            application: dir.join(FIRMWARE_BIN),
        }
    }

    /// Every artifact path that is not a regular file, in flash-layout order.
    pub fn missing(&self) -> Vec<PathBuf> {
        [&self.bootloader, &self.partitions, &self.application]
            .into_iter()
            .filter(|p| !p.is_file())
            .cloned()
            .collect()
    }

    pub fn validate(&self, env: &Environment) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MergeError::MissingArtifacts {
                env: env.name().to_owned(),
                missing,
            })
        }
    }
}

/// Subdirectories found under a build root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRootListing {
    /// Environments containing the completion marker, sorted.
    pub built: Vec<String>,
    /// Every subdirectory, built or not, sorted.
    pub all: Vec<String>,
}

/// List the environments under `build_root`.
///
/// Read-only; a missing or unreadable root yields an empty listing so the
/// resolver can report "nothing built" rather than an I/O failure.
pub fn scan_build_root(build_root: &Path) -> BuildRootListing {
    let Ok(entries) = fs::read_dir(build_root) else {
        tracing::debug!(root = %build_root.display(), "build root not readable");
        return BuildRootListing::default();
    };

    let mut listing = BuildRootListing::default();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.join(COMPLETION_MARKER).is_file() {
            listing.built.push(name.to_owned());
        }
        listing.all.push(name.to_owned());
    }
    listing.built.sort();
    listing.all.sort();
    listing
}
