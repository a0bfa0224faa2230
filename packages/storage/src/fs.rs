//! Atomic filesystem operations.

use std::ffi::OsString;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

/// Why a rename did not happen.
#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    /// The source path no longer exists; someone else moved it first.
    #[error("source is gone: {0}")]
    SourceMissing(#[source] io::Error),

    /// Something already lives at the destination path.
    #[error("destination exists: {0}")]
    DestinationExists(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl RenameError {
    pub fn into_io(self) -> io::Error {
        match self {
            RenameError::SourceMissing(e) | RenameError::DestinationExists(e) | RenameError::Io(e) => e,
        }
    }
}

/// Atomically move `from` to `to`, never replacing an existing destination.
///
/// Among concurrent callers renaming the same source, exactly one succeeds;
/// the others see [`RenameError::SourceMissing`].
pub fn rename(from: &Path, to: &Path) -> Result<(), RenameError> {
    match rename_noreplace(from, to) {
        Ok(()) => Ok(()),
        Err(err) => Err(classify_rename_error(from, err)),
    }
}

fn classify_rename_error(from: &Path, err: io::Error) -> RenameError {
    match err.kind() {
        ErrorKind::AlreadyExists | ErrorKind::DirectoryNotEmpty => {
            RenameError::DestinationExists(err)
        }
        // ENOENT is also what a missing destination parent looks like.
        ErrorKind::NotFound if from.symlink_metadata().is_err() => RenameError::SourceMissing(err),
        _ => RenameError::Io(err),
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[allow(unsafe_code)]
fn rename_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let from_c = CString::new(from.as_os_str().as_bytes())?;
    let to_c = CString::new(to.as_os_str().as_bytes())?;

    // SAFETY: both pointers come from live CStrings that outlive the call, and
    // AT_FDCWD makes the paths resolve exactly as std::fs::rename would.
    let ret = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            from_c.as_ptr(),
            libc::AT_FDCWD,
            to_c.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if ret == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // Kernel or filesystem without RENAME_NOREPLACE support.
        Some(libc::EINVAL) | Some(libc::ENOSYS) => {
            tracing::trace!(from = %from.display(), "renameat2 unsupported, using rename");
            std::fs::rename(from, to)
        }
        _ => Err(err),
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn rename_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::rename(from, to)
}

/// Create a new, uniquely named directory `<prefix><random>` inside `parent`.
///
/// Name collisions are retried by the allocator; the directory is not removed
/// when the returned path is dropped.
pub fn create_unique_dir(parent: &Path, prefix: &str) -> io::Result<PathBuf> {
    let dir = Builder::new().prefix(prefix).tempdir_in(parent)?;
    Ok(dir.keep())
}

/// Create a new, uniquely named file `<prefix><random>` inside `parent`.
///
/// The file is deleted when the handle is dropped unless it is persisted.
pub fn create_unique_file(parent: &Path, prefix: &str) -> io::Result<NamedTempFile> {
    Builder::new().prefix(prefix).tempfile_in(parent)
}

/// Names of the entries directly inside `dir`, in no particular order.
pub fn list_names(dir: &Path) -> io::Result<Vec<OsString>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name());
    }
    Ok(names)
}

/// Create `path` as a directory; an existing entry is not an error.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match std::fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn rename_moves_directory() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        std::fs::create_dir(&from)?;

        rename(&from, &to).map_err(RenameError::into_io)?;
        assert!(!from.exists());
        assert!(to.is_dir());
        Ok(())
    }

    #[test]
    fn rename_reports_missing_source() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = rename(&dir.path().join("gone"), &dir.path().join("b"));
        assert!(matches!(result, Err(RenameError::SourceMissing(_))));
        Ok(())
    }

    #[test]
    fn rename_missing_destination_parent_is_not_source_missing() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let from = dir.path().join("a");
        std::fs::create_dir(&from)?;

        let result = rename(&from, &dir.path().join("no-such-dir").join("a"));
        assert!(matches!(result, Err(RenameError::Io(_))));
        assert!(from.is_dir());
        Ok(())
    }

    #[test]
    fn rename_refuses_non_empty_destination() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        std::fs::create_dir(&from)?;
        std::fs::create_dir(&to)?;
        std::fs::write(to.join("prop"), b"keep")?;

        let result = rename(&from, &to);
        assert!(matches!(result, Err(RenameError::DestinationExists(_))));
        assert_eq!(std::fs::read(to.join("prop"))?, b"keep");
        Ok(())
    }

    #[test]
    fn unique_dirs_do_not_collide() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = create_unique_dir(dir.path(), "build-")?;
        let b = create_unique_dir(dir.path(), "build-")?;
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
        let name = a.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("build-"));
        Ok(())
    }

    #[test]
    fn unpersisted_temp_file_is_removed() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = create_unique_file(dir.path(), "key")?;
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn ensure_dir_is_idempotent() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x");
        ensure_dir(&path)?;
        ensure_dir(&path)?;
        assert_eq!(list_names(dir.path())?, vec![OsString::from("x")]);
        Ok(())
    }
}
