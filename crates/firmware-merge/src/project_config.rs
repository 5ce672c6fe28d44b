//! `platformio.ini` lookup.
//!
//! Only `default_envs` is read. The first occurrence of the key is
//! authoritative and only its first listed value is used; later entries are
//! never expanded into a batch.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{MergeError, Result};

pub const PROJECT_CONFIG: &str = "platformio.ini";
pub const DEFAULT_ENVS_KEY: &str = "default_envs";

/// Read the declared default environment from `<project_root>/platformio.ini`.
///
/// A missing file is not an error. An unreadable one is.
pub fn read_default_env(project_root: &Path) -> Result<Option<String>> {
    let path = project_root.join(PROJECT_CONFIG);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(MergeError::Config { path, source }),
    };
    let value = default_envs(&text).into_iter().next();
    if value.is_none() {
        tracing::debug!(path = %path.display(), "no usable default_envs");
    }
    Ok(value)
}

/// Values of the first `default_envs` entry in `text`, in declared order.
///
/// Handles `default_envs = a, b` as well as INI continuation lines:
///
/// ```ini
/// default_envs =
///     a
///     b
/// ```
pub fn default_envs(text: &str) -> Vec<String> {
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if is_comment(trimmed) {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        if key.trim() != DEFAULT_ENVS_KEY {
            continue;
        }

        let mut raw = strip_inline_comment(value).to_owned();
        while let Some(next) = lines.peek() {
            let continues = next.starts_with([' ', '\t']) && !next.trim().is_empty();
            if !continues || is_comment(next.trim()) {
                break;
            }
            raw.push(',');
            raw.push_str(strip_inline_comment(next));
            lines.next();
        }
        return split_values(&raw);
    }
    Vec::new()
}

fn is_comment(line: &str) -> bool {
    line.starts_with(';') || line.starts_with('#')
}

/// Text before the first `;` or `#`; PlatformIO allows trailing comments on values.
fn strip_inline_comment(value: &str) -> &str {
    value.split_once([';', '#']).map_or(value, |(before, _)| before)
}

fn split_values(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect()
}
