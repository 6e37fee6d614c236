use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// File name of the package manifest, looked up in the package root
pub const MANIFEST_NAME: &str = "package.yml";

/// The package description record consumed by upload and download.
/// Only `name` feeds the archive root and the remote package identifier;
/// the remaining fields are carried for the repository service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
}

impl Manifest {
    /// Load and validate the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Validation(format!(
                    "{} not found; run `cpm init` first",
                    MANIFEST_NAME
                ))
                .into());
            }
            Err(e) => {
                return Err(Error::Io(e))
                    .with_context(|| format!("Failed to stat {:?}", path));
            }
        };

        if !meta.is_file() {
            return Err(Error::Validation(format!(
                "{} is not a regular file",
                MANIFEST_NAME
            ))
            .into());
        }

        let content = fs::read_to_string(path)
            .map_err(Error::Io)
            .with_context(|| format!("Failed to read {:?}", path))?;

        let manifest: Manifest = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        manifest.validate()?;

        Ok(manifest)
    }

    /// Check that every required field is present, reporting all missing
    /// fields at once.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.name.is_empty() {
            missing.push("name");
        }
        if self.version.is_empty() {
            missing.push("version");
        }
        if self.description.is_empty() {
            missing.push("description");
        }
        if self.author.is_empty() {
            missing.push("author");
        }

        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "{} missing required field(s): {}",
                MANIFEST_NAME,
                missing.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

/// Render a fresh manifest for `cpm init`.
pub fn manifest_template(package_name: &str, author: &str) -> String {
    let escaped_pkg = package_name.replace('"', "\\\"");
    let escaped_author = author.replace('"', "\\\"");
    format!(
        "name: \"{}\"\nversion: \"0.0.0\"\ndescription: \"\"\nauthor: \"{}\"\n",
        escaped_pkg, escaped_author
    )
}
