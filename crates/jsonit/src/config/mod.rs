use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::models::ManualOverrides;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
}

impl RuntimePaths {
    /// Resolves a path given on the command line against these runtime paths.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        resolve_user_path(path, &self.home_dir, &self.cwd)
    }
}

pub fn resolve_runtime_paths(home_dir: &Path, cwd: &Path) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    Ok(RuntimePaths {
        home_dir: normalize_lexical(home_dir),
        cwd: normalize_lexical(cwd),
    })
}

pub fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

/// Reads a JSON object of override strings. Unknown keys are returned so the
/// caller can warn about them.
pub fn load_overrides_file(path: &Path) -> Result<(ManualOverrides, Vec<String>)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read overrides file: {}", path.display()))?;
    parse_overrides(&raw).with_context(|| format!("invalid overrides file: {}", path.display()))
}

pub fn parse_overrides(raw: &str) -> Result<(ManualOverrides, Vec<String>)> {
    let Value::Object(entries) = serde_json::from_str::<Value>(raw)? else {
        bail!("overrides must be a JSON object of strings");
    };

    let mut pairs = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let text = match value {
            Value::String(text) => text,
            other => bail!("override `{key}` must be a string, got {other}"),
        };
        pairs.push((key, text));
    }

    Ok(ManualOverrides::from_pairs(pairs))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
