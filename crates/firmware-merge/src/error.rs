//! Error types for firmware-merge.

use std::path::PathBuf;
use std::process::ExitStatus;

pub type Result<T> = std::result::Result<T, MergeError>;

/// Coarse category of a [`MergeError`].
///
/// Run-level kinds abort the whole invocation; environment-level kinds only
/// fail the environment being processed when running in batch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resolution,
    Discovery,
    Validation,
    Execution,
}

impl ErrorKind {
    /// `true` for errors that stop every remaining environment.
    pub const fn is_run_level(self) -> bool {
        matches!(
            self,
            ErrorKind::Configuration | ErrorKind::Resolution | ErrorKind::Discovery
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("--{first} cannot be used together with --{second}")]
    IncompatibleFlags {
        first: &'static str,
        second: &'static str,
    },

    #[error("Failed to read {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not detect PlatformIO environment")]
    Unresolved { available: Vec<String> },

    #[error("No built environments found in {build_root}")]
    NoBuiltEnvironments {
        build_root: PathBuf,
        available: Vec<String>,
    },

    #[error("Invalid package search pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("Could not find esptool.py in {searched}")]
    ToolNotFound { searched: PathBuf },

    #[error("Missing build artifacts for '{env}': {}", join_paths(.missing))]
    MissingArtifacts { env: String, missing: Vec<PathBuf> },

    #[error("esptool exited with {status} while merging '{env}'")]
    Execution { env: String, status: ExitStatus },

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MergeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MergeError::IncompatibleFlags { .. } | MergeError::Config { .. } => {
                ErrorKind::Configuration
            }
            MergeError::Unresolved { .. } | MergeError::NoBuiltEnvironments { .. } => {
                ErrorKind::Resolution
            }
            MergeError::ToolNotFound { .. } | MergeError::Pattern(_) => ErrorKind::Discovery,
            MergeError::MissingArtifacts { .. } => ErrorKind::Validation,
            MergeError::Execution { .. } | MergeError::Launch { .. } | MergeError::Io { .. } => {
                ErrorKind::Execution
            }
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_flags_is_configuration() {
        let err = MergeError::IncompatibleFlags {
            first: "out",
            second: "all",
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.kind().is_run_level());
        assert_eq!(err.to_string(), "--out cannot be used together with --all");
    }

    #[test]
    fn missing_artifacts_lists_every_path() {
        let err = MergeError::MissingArtifacts {
            env: "esp32dev".into(),
            missing: vec![
                PathBuf::from("a/bootloader.bin"),
                PathBuf::from("a/firmware.bin"),
            ],
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.kind().is_run_level());
        let msg = err.to_string();
        assert!(msg.contains("a/bootloader.bin"));
        assert!(msg.contains("a/firmware.bin"));
    }

    #[test]
    fn tool_not_found_is_run_level() {
        let err = MergeError::ToolNotFound {
            searched: PathBuf::from("/home/u/.platformio/packages"),
        };
        assert_eq!(err.kind(), ErrorKind::Discovery);
        assert!(err.kind().is_run_level());
    }
}
