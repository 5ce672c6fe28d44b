//! Environment resolution.
//!
//! Precedence, highest first:
//!
//! 1. `--env NAME`, taken as-is without checking the build root
//! 2. first value of `default_envs` in `platformio.ini`
//! 3. the only environment under `.pio/build` holding a `firmware.bin`
//!
//! `--all` bypasses the chain and selects every built environment.

use std::path::{Path, PathBuf};

use crate::environment::{build_root, scan_build_root, Environment};
use crate::error::{MergeError, Result};
use crate::project_config::read_default_env;

/// What the operator asked for on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveRequest {
    pub env: Option<String>,
    pub all: bool,
    pub out: Option<PathBuf>,
}

impl ResolveRequest {
    /// Reject flag combinations that can never be satisfied. Touches no files.
    pub fn check(&self) -> Result<()> {
        if self.all && self.out.is_some() {
            return Err(MergeError::IncompatibleFlags {
                first: "out",
                second: "all",
            });
        }
        if self.all && self.env.is_some() {
            return Err(MergeError::IncompatibleFlags {
                first: "env",
                second: "all",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    Single(Environment),
    /// Sorted lexicographically, never empty.
    Batch(Vec<Environment>),
}

impl ResolvedTarget {
    pub fn environments(&self) -> &[Environment] {
        match self {
            ResolvedTarget::Single(env) => std::slice::from_ref(env),
            ResolvedTarget::Batch(envs) => envs,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, ResolvedTarget::Batch(_))
    }
}

pub fn resolve(request: &ResolveRequest, project_root: &Path) -> Result<ResolvedTarget> {
    request.check()?;

    if request.all {
        return resolve_all(project_root).map(ResolvedTarget::Batch);
    }
    resolve_single(request.env.as_deref(), project_root).map(ResolvedTarget::Single)
}

fn resolve_single(explicit: Option<&str>, project_root: &Path) -> Result<Environment> {
    if let Some(name) = explicit {
        tracing::debug!(env = name, "using explicit environment");
        return Ok(Environment::new(name));
    }

    if let Some(name) = read_default_env(project_root)? {
        tracing::debug!(env = %name, "using default_envs from platformio.ini");
        return Ok(Environment::new(name));
    }

    let listing = scan_build_root(&build_root(project_root));
    match listing.built.as_slice() {
        [only] => {
            tracing::debug!(env = %only, "inferred environment from build root");
            Ok(Environment::new(only.as_str()))
        }
        built => {
            tracing::debug!(candidates = built.len(), "environment inference ambiguous");
            Err(MergeError::Unresolved {
                available: listing.all,
            })
        }
    }
}

fn resolve_all(project_root: &Path) -> Result<Vec<Environment>> {
    let root = build_root(project_root);
    let listing = scan_build_root(&root);
    if listing.built.is_empty() {
        return Err(MergeError::NoBuiltEnvironments {
            build_root: root,
            available: listing.all,
        });
    }
    Ok(listing.built.into_iter().map(Environment::new).collect())
}
