use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::archive::pack_directory;
use crate::config::RegistryConfig;
use crate::digest;
use crate::manifest::{Manifest, MANIFEST_NAME};
use crate::repository::RepositoryClient;

/// Validate the manifest, pack the current directory under the manifest
/// name and upload the archive.
pub fn run(config: &RegistryConfig, token: &str) -> Result<()> {
    let cwd = env::current_dir().context("Failed to get current directory")?;

    let manifest = Manifest::load(&cwd.join(MANIFEST_NAME))?;

    let archive = pack_directory(&cwd, &manifest.name)?;
    tracing::debug!(
        "packed {} ({} bytes, sha256 {})",
        manifest.name,
        archive.len(),
        digest::sha256_hex(&archive)
    );

    let client = RepositoryClient::new(
        &config.registry_url,
        Duration::from_secs(config.timeout_secs),
    )?;
    let url = client.upload(&manifest.name, archive, token)?;

    println!("Upload successful: {}", url);

    Ok(())
}
