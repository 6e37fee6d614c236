use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::{write::GzEncoder, Compression};

/// Pack the tree under `source_dir` into a gzip-compressed tar archive.
///
/// Every entry is rooted under `root_name`; an empty `root_name` falls back
/// to the base name of `source_dir`. Directories are visited before their
/// contents and siblings in byte-wise name order, so packing the same
/// unmodified tree twice yields the same entry sequence.
///
/// Symlinks, devices and other special files are skipped. Any unreadable
/// entry aborts the whole pack; a partial archive is never returned.
pub fn pack_directory(source_dir: &Path, root_name: &str) -> Result<Vec<u8>> {
    let meta = fs::metadata(source_dir)
        .with_context(|| format!("Failed to read source directory {:?}", source_dir))?;
    if !meta.is_dir() {
        anyhow::bail!("{:?} is not a directory", source_dir);
    }

    let root_name = if root_name.is_empty() {
        source_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve source directory {:?}", source_dir))?
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("No base name for source directory {:?}", source_dir))?
    } else {
        root_name.to_string()
    };

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    {
        let mut builder = tar::Builder::new(&mut encoder);
        builder.follow_symlinks(false);

        let mut logged_kinds = HashSet::new();
        append_dir_entries(
            &mut builder,
            source_dir,
            Path::new(&root_name),
            &mut logged_kinds,
        )?;

        builder
            .finish()
            .context("Failed to finalize tar archive")?;
    }

    encoder
        .finish()
        .context("Failed to finish gzip compression stream")
}

/// Append every entry under `dir`, recorded under `archive_dir`, recursing
/// into subdirectories before moving to the next sibling.
fn append_dir_entries(
    builder: &mut tar::Builder<&mut GzEncoder<Vec<u8>>>,
    dir: &Path,
    archive_dir: &Path,
    logged_kinds: &mut HashSet<&'static str>,
) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Failed to walk directory {:?}", dir))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to walk directory {:?}", dir))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to read file type of {:?}", path))?;
        let archive_path = archive_dir.join(entry.file_name());

        if file_type.is_dir() {
            builder
                .append_dir(&archive_path, &path)
                .with_context(|| format!("Failed to add directory {:?} to archive", path))?;
            append_dir_entries(builder, &path, &archive_path, logged_kinds)?;
        } else if file_type.is_file() {
            let mut file = File::open(&path)
                .with_context(|| format!("Failed to open {:?}", path))?;
            builder
                .append_file(&archive_path, &mut file)
                .with_context(|| format!("Failed to add file {:?} to archive", path))?;
        } else {
            let kind = if file_type.is_symlink() {
                "symlink"
            } else {
                "special file"
            };
            if logged_kinds.insert(kind) {
                tracing::debug!("skipping unsupported {} entries (first: {:?})", kind, path);
            }
        }
    }

    Ok(())
}
