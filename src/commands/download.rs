use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::archive::unpack_archive;
use crate::config::RegistryConfig;
use crate::digest;
use crate::error::Error;
use crate::repository::RepositoryClient;

pub struct DownloadArgs {
    pub package: String,
    /// Extraction directory; falls back to the configured dest_dir
    pub output: Option<PathBuf>,
    /// Per-invocation registry URL override
    pub registry: Option<String>,
    /// Expected SHA-256 of the archive; verified before extraction when set
    pub checksum: Option<String>,
}

/// Download a package archive and extract it into the destination
/// directory, streaming the response body straight into the extractor
/// unless checksum verification asks for a spool first.
pub fn run(config: &RegistryConfig, args: &DownloadArgs) -> Result<()> {
    let registry_url = args.registry.as_deref().unwrap_or(&config.registry_url);
    let dest_dir = args
        .output
        .clone()
        .unwrap_or_else(|| config.dest_dir.clone());

    let client = RepositoryClient::new(registry_url, Duration::from_secs(config.timeout_secs))?;

    let response = client.download(&args.package)?;

    let progress = progress_bar(response.content_length());
    let reader = progress.wrap_read(response);

    match &args.checksum {
        Some(expected) => extract_verified(reader, &dest_dir, expected, &args.package)?,
        None => unpack_archive(reader, &dest_dir)?,
    }
    progress.finish_and_clear();

    println!("Extracted {} into {}", args.package, dest_dir.display());

    Ok(())
}

fn progress_bar(content_length: Option<u64>) -> ProgressBar {
    match content_length {
        Some(length) => {
            let bar = ProgressBar::new(length);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .expect("Failed to create progress template")
                    .progress_chars("█▓░"),
            );
            bar.set_message("Downloading");
            bar
        }
        None => ProgressBar::hidden(),
    }
}

/// Spool the body to an anonymous temp file while hashing it, check the
/// digest, then extract from the spool. The spool is working storage only;
/// dropping the handle removes it on every exit path.
fn extract_verified<R: Read>(
    mut reader: R,
    dest_dir: &Path,
    expected: &str,
    package: &str,
) -> Result<()> {
    let mut spool = tempfile::tempfile().context("Failed to create temporary spool file")?;
    let (spooled, actual) =
        digest::copy_and_hash(&mut reader, &mut spool).context("Failed to spool archive")?;
    tracing::debug!("spooled {} bytes for {} (sha256 {})", spooled, package, actual);

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::Validation(format!(
            "archive digest mismatch for {}: expected {}, got {}",
            package, expected, actual
        ))
        .into());
    }

    spool
        .seek(SeekFrom::Start(0))
        .context("Failed to rewind spool file")?;
    unpack_archive(spool, dest_dir)
}
