//! Single-instance guard: an exclusive `flock` on `<root>/config/secrets/gateway.lock`,
//! holding the process id. Acquired before the listener binds so "another instance
//! running" (exit code 3) is distinguishable from "port in use" (exit code 2).

use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct InstanceLock {
    _file: File,
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join("config").join("secrets").join("gateway.lock")
}

/// Acquires the lock, returning `Ok(None)` if another instance already holds it.
pub fn acquire(path: &Path) -> std::io::Result<Option<InstanceLock>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    if file.try_lock_exclusive().is_err() {
        return Ok(None);
    }

    let mut file = file;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(Some(InstanceLock { _file: file }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.lock");
        let first = acquire(&path).unwrap();
        assert!(first.is_some());

        let second = acquire(&path).unwrap();
        assert!(second.is_none());

        drop(first);
        let third = acquire(&path).unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn lock_path_is_under_config_secrets() {
        let root = Path::new("/tmp/vla-root");
        assert_eq!(lock_path(root), root.join("config/secrets/gateway.lock"));
    }
}
