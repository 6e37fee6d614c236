use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::Error;
use crate::manifest::{manifest_template, MANIFEST_NAME};

/// Resolve the local username for the manifest author field, falling back
/// through the usual environment variables.
fn username() -> Option<String> {
    for var in ["USER", "USERNAME"] {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Scaffold a manifest in `dir`, named after the directory. Refuses to
/// overwrite an existing manifest.
pub fn init_package(dir: &Path) -> Result<()> {
    let manifest_path = dir.join(MANIFEST_NAME);
    if manifest_path.exists() {
        return Err(Error::Validation(format!("{} already exists", MANIFEST_NAME)).into());
    }

    let package_name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    let author = username().unwrap_or_default();

    fs::write(&manifest_path, manifest_template(&package_name, &author))
        .with_context(|| format!("Failed to write {:?}", manifest_path))?;

    Ok(())
}

pub fn run() -> Result<()> {
    let cwd = env::current_dir().context("Failed to get current directory")?;
    init_package(&cwd)?;
    println!("Initialized {} in {}", MANIFEST_NAME, cwd.display());
    Ok(())
}
