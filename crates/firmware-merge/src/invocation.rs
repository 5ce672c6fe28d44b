//! The `esptool merge_bin` command line for the classic ESP32 flash layout.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::environment::{ArtifactSet, Environment};
use crate::toolchain::Toolchain;

pub const CHIP: &str = "esp32";
pub const FLASH_MODE: &str = "dio";
pub const FLASH_FREQ: &str = "40m";
pub const FLASH_SIZE: &str = "4MB";

/// Second-stage bootloader offset on ESP32.
pub const BOOTLOADER_OFFSET: u32 = 0x1000;
/// Default partition table offset.
pub const PARTITIONS_OFFSET: u32 = 0x8000;
/// First app partition (`factory`/`ota_0`).
pub const APPLICATION_OFFSET: u32 = 0x10000;

/// Merged images land here, relative to the project root.
pub const OUTPUT_DIR: &str = "scripts/build";

/// `<project_root>/scripts/build/full_firmware_<env>.bin`
///
/// Deterministic per environment, so a rerun overwrites the previous image.
pub fn default_output_path(project_root: &Path, env: &Environment) -> PathBuf {
    project_root
        .join(OUTPUT_DIR)
        .join(format!("full_firmware_{}.bin", env.name()))
}

/// One image placed at a fixed flash offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub offset: u32,
    pub file: PathBuf,
}

impl Segment {
    fn offset_arg(&self) -> String {
        format!("{:#x}", self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInvocation {
    pub env: Environment,
    pub python: PathBuf,
    pub esptool: PathBuf,
    pub output: PathBuf,
    segments: [Segment; 3],
}

impl MergeInvocation {
    pub fn new(
        env: Environment,
        toolchain: &Toolchain,
        artifacts: &ArtifactSet,
        output: PathBuf,
    ) -> Self {
        Self {
            env,
            python: toolchain.python.clone(),
            esptool: toolchain.esptool.clone(),
            output,
            segments: [
                Segment {
                    offset: BOOTLOADER_OFFSET,
                    file: artifacts.bootloader.clone(),
                },
                Segment {
                    offset: PARTITIONS_OFFSET,
                    file: artifacts.partitions.clone(),
                },
                Segment {
                    offset: APPLICATION_OFFSET,
                    file: artifacts.application.clone(),
                },
            ],
        }
    }

    /// Address/file pairs in ascending offset order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Program to spawn (the interpreter).
    pub fn program(&self) -> &Path {
        &self.python
    }

    /// Everything after the interpreter, starting with the esptool script.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.esptool.clone().into(),
            "--chip".into(),
            CHIP.into(),
            "merge_bin".into(),
            "-o".into(),
            self.output.clone().into(),
            "--flash_mode".into(),
            FLASH_MODE.into(),
            "--flash_freq".into(),
            FLASH_FREQ.into(),
            "--flash_size".into(),
            FLASH_SIZE.into(),
        ];
        for segment in &self.segments {
            args.push(segment.offset_arg().into());
            args.push(segment.file.clone().into());
        }
        args
    }
}

/// Space-joined command line, for echoing to the operator.
impl fmt::Display for MergeInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.python.display())?;
        for arg in self.args() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
