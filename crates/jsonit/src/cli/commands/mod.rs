pub mod extract;
pub mod schema;
pub mod search;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::RuntimePaths;

pub const STDIN_LABEL: &str = "<stdin>";

/// Log text from `input`, or stdin when it is absent or `-`. Invalid UTF-8 is
/// replaced rather than rejected.
pub fn read_input(input: Option<&Path>, runtime_paths: &RuntimePaths) -> Result<(String, String)> {
    match input.filter(|path| *path != Path::new("-")) {
        Some(path) => {
            let resolved = runtime_paths.resolve(path)?;
            let bytes = std::fs::read(&resolved)
                .with_context(|| format!("failed to read input: {}", resolved.display()))?;
            Ok((
                String::from_utf8_lossy(&bytes).into_owned(),
                resolved.display().to_string(),
            ))
        }
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut bytes)
                .context("failed to read input from stdin")?;
            Ok((
                String::from_utf8_lossy(&bytes).into_owned(),
                STDIN_LABEL.to_string(),
            ))
        }
    }
}
