//! Signature Vault - Secure Filesystem Operations
//!
//! Whole-file reads and atomic whole-file replacement for assets and the
//! key file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;
use zeroize::Zeroizing;

/// Read a whole file into a buffer that is wiped on drop
pub fn read_secret(path: &Path) -> io::Result<Zeroizing<Vec<u8>>> {
    let mut file = File::open(path)?;
    let mut data = Zeroizing::new(Vec::new());
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Replace `path` with `data` atomically
///
/// The bytes go to a uniquely named sibling temp file which is fsynced and
/// then renamed over the target, so a crash leaves either the old or the
/// new content, never a truncated mix. A symlink is followed and its target
/// replaced, and an existing file keeps its permissions.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let target = resolve_target(path)?;
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_sibling(&target);
    let result = write_and_rename(&temp_path, &target, data);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// The file a write to `path` lands in: the link target for symlinks
fn resolve_target(path: &Path) -> io::Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(path),
        _ => Ok(path.to_path_buf()),
    }
}

fn write_and_rename(temp_path: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;

    // Before any data lands, so a locked-down asset is never readable via the temp file
    if let Ok(meta) = fs::metadata(path) {
        file.set_permissions(meta.permissions())?;
    }

    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)
}

/// `dir/.name.<uuid>.tmp`, on the same filesystem as the target
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}
