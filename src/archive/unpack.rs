use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use tar::EntryType;

use crate::error::Error;

/// Unpack a gzip-compressed tar stream into `dest_dir`, creating it (and
/// parents) if absent.
///
/// Every entry is checked against the canonicalized destination root before
/// anything is written for it: absolute paths and `..` components are
/// rejected outright, and the resolved on-disk parent must be the root or a
/// component-wise descendant of it. A violation aborts extraction with
/// [`Error::PathTraversal`]; entries written before the violation remain on
/// disk, so callers wanting all-or-nothing semantics should extract into a
/// staging directory and rename.
pub fn unpack_archive<R: Read>(reader: R, dest_dir: &Path) -> Result<()> {
    fs::create_dir_all(dest_dir)
        .map_err(Error::Io)
        .with_context(|| format!("Failed to create destination directory {:?}", dest_dir))?;
    let dest_root = dest_dir
        .canonicalize()
        .map_err(Error::Io)
        .with_context(|| format!("Failed to resolve destination directory {:?}", dest_dir))?;

    let decoder = GzDecoder::new(reader);
    let mut archive = tar::Archive::new(decoder);

    let entries = archive
        .entries()
        .map_err(|e| Error::ArchiveFormat(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::ArchiveFormat(e.to_string()))?;
        let entry_path = entry
            .path()
            .map_err(|e| Error::ArchiveFormat(e.to_string()))?
            .into_owned();
        let entry_name = entry_path.to_string_lossy().into_owned();

        let relative = reject_unsafe_components(&entry_path, &dest_root, &entry_name)?;
        let target = dest_root.join(&relative);
        let mode = entry.header().mode().unwrap_or(0o644);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)
                    .map_err(Error::Io)
                    .with_context(|| format!("Failed to create directory {:?}", target))?;
                ensure_within_root(&target, &dest_root, &entry_name)?;
                set_permissions(&target, mode)
                    .map_err(Error::Io)
                    .with_context(|| format!("Failed to set mode on {:?}", target))?;
            }
            EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .map_err(Error::Io)
                        .with_context(|| format!("Failed to create parent directory {:?}", parent))?;
                    ensure_within_root(parent, &dest_root, &entry_name)?;
                }
                let mut file = fs::File::create(&target)
                    .map_err(Error::Io)
                    .with_context(|| format!("Failed to create file {:?}", target))?;
                io::copy(&mut entry, &mut file)
                    .map_err(Error::Io)
                    .with_context(|| format!("Failed to write file {:?}", target))?;
                set_permissions(&target, mode)
                    .map_err(Error::Io)
                    .with_context(|| format!("Failed to set mode on {:?}", target))?;
            }
            other => {
                tracing::warn!(
                    "skipping unsupported archive entry {:?} ({:?})",
                    entry_name,
                    other
                );
            }
        }
    }

    Ok(())
}

/// Lexical screen: strip `.` components and reject anything that is not a
/// plain relative path segment.
fn reject_unsafe_components(
    entry_path: &Path,
    dest_root: &Path,
    entry_name: &str,
) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in entry_path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal {
                    entry: entry_name.to_string(),
                    dest: dest_root.to_path_buf(),
                }
                .into());
            }
        }
    }
    Ok(clean)
}

/// Canonical containment check. `dest_root` is already canonical, so a
/// sibling directory sharing a string prefix never passes; symlinked
/// components inside the destination are resolved before comparing.
fn ensure_within_root(path: &Path, dest_root: &Path, entry_name: &str) -> Result<()> {
    let canonical = path
        .canonicalize()
        .map_err(Error::Io)
        .with_context(|| format!("Failed to resolve {:?}", path))?;
    if !canonical.starts_with(dest_root) {
        return Err(Error::PathTraversal {
            entry: entry_name.to_string(),
            dest: dest_root.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
