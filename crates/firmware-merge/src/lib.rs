//! Firmware merge — pick a PlatformIO build environment and fold its
//! bootloader, partition table and application into one flashable image.
//!
//! # Modules
//!
//! - [`environment`] — `Environment`, `ArtifactSet`, build-root listing
//! - [`project_config`] — `default_envs` lookup in `platformio.ini`
//! - [`resolver`] — precedence chain and batch selection
//! - [`toolchain`] — locating `esptool.py` and the Python interpreter
//! - [`invocation`] — the `esptool merge_bin` command line for the ESP32 layout
//! - [`orchestrator`] — validate, merge and report per environment
//! - [`error`] — `MergeError` and its taxonomy

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
// Field-level rustdoc is incomplete; module docs carry the contract.
#![allow(missing_docs)]

pub mod environment;
pub mod error;
pub mod invocation;
pub mod orchestrator;
pub mod project_config;
pub mod resolver;
pub mod toolchain;

// Top-level re-exports for convenience
pub use environment::{scan_build_root, ArtifactSet, BuildRootListing, Environment};
pub use error::{ErrorKind, MergeError, Result};
pub use invocation::{default_output_path, MergeInvocation, Segment};
pub use orchestrator::{CommandRunner, Observer, Orchestrator, Outcome, ProcessRunner, RunReport};
pub use project_config::read_default_env;
pub use resolver::{resolve, ResolveRequest, ResolvedTarget};
pub use toolchain::Toolchain;
